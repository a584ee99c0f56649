//! These structs provide the CLI interface for the ninja CLI.

use crate::editor::CascadeScope;
use crate::model::{SessionId, TransactionColumn, TransactionId};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// ninja: A command-line client for the expense ninja backend.
///
/// Upload a bank statement and an optional product-to-tag mapping, let the backend categorize
/// your spending, then search, filter and correct the resulting transactions.
///
/// Set EXPENSE_NINJA_IN_TEST_MODE to any non-empty value to run against an in-memory backend that
/// is stored in your ninja home directory.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the ninja home directory and its config.json.
    ///
    /// This is the first command you should run. By default the home directory is
    /// $HOME/expense-ninja and the backend is expected at http://127.0.0.1:5000.
    Init(InitArgs),
    /// Run the onboarding wizard from session creation to processed transactions.
    Wizard(WizardArgs),
    /// List the transactions of a session, optionally searched, filtered and sorted.
    Transactions(TransactionsArgs),
    /// Change the tag of a transaction, or of every transaction with the same product.
    UpdateTag(UpdateTagArgs),
    /// Rename the product of a transaction, or of every transaction with the same product.
    UpdateProduct(UpdateProductArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration is held. Defaults to ~/expense-ninja
    #[arg(long, env = "NINJA_HOME", default_value_t = default_ninja_home())]
    ninja_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, ninja_home: PathBuf) -> Self {
        Self {
            log_level,
            ninja_home: ninja_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn ninja_home(&self) -> &DisplayPath {
        &self.ninja_home
    }
}

/// Args for the `ninja init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the expense backend.
    #[arg(long, default_value = crate::config::DEFAULT_API_BASE_URL)]
    api_url: String,
}

impl InitArgs {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// Args for the `ninja wizard` command.
#[derive(Debug, Parser, Clone)]
pub struct WizardArgs {
    /// The username for the new session. It must not be taken.
    #[arg(long)]
    username: String,

    #[clap(flatten)]
    statement: StatementArgs,

    #[clap(flatten)]
    tag_mapping: TagMappingArgs,

    /// Let the backend use AI to categorize transactions.
    #[arg(long)]
    enable_ai: bool,
}

impl WizardArgs {
    pub fn new(
        username: impl Into<String>,
        statement: StatementArgs,
        tag_mapping: TagMappingArgs,
        enable_ai: bool,
    ) -> Self {
        Self {
            username: username.into(),
            statement,
            tag_mapping,
            enable_ai,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn statement(&self) -> &StatementArgs {
        &self.statement
    }

    pub fn tag_mapping(&self) -> &TagMappingArgs {
        &self.tag_mapping
    }

    pub fn enable_ai(&self) -> bool {
        self.enable_ai
    }
}

/// Exactly one of a statement file or the sample statement.
#[derive(Debug, ClapArgs, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct StatementArgs {
    /// Path to a CSV bank statement.
    #[arg(long)]
    statement: Option<PathBuf>,

    /// Use the backend's sample statement.
    #[arg(long)]
    sample_statement: bool,
}

impl StatementArgs {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            statement: Some(path.into()),
            sample_statement: false,
        }
    }

    pub fn sample() -> Self {
        Self {
            statement: None,
            sample_statement: true,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.statement.as_deref()
    }
}

/// Exactly one of a tag mapping file, the sample mapping or skipping the step.
#[derive(Debug, ClapArgs, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct TagMappingArgs {
    /// Path to a CSV file with `product` and `tag` columns.
    #[arg(long)]
    tag_mapping: Option<PathBuf>,

    /// Use the backend's sample tag mapping.
    #[arg(long)]
    sample_tag_mapping: bool,

    /// Do not upload a tag mapping.
    #[arg(long)]
    skip_tag_mapping: bool,
}

impl TagMappingArgs {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            tag_mapping: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn sample() -> Self {
        Self {
            sample_tag_mapping: true,
            ..Self::default()
        }
    }

    pub fn skip() -> Self {
        Self {
            skip_tag_mapping: true,
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.tag_mapping.as_deref()
    }

    pub fn is_skip(&self) -> bool {
        self.skip_tag_mapping
    }
}

/// The session a command works on.
#[derive(Debug, ClapArgs, Clone, Default)]
pub struct SessionArgs {
    /// The session id printed by `ninja wizard`.
    #[arg(long, env = "NINJA_SESSION_ID")]
    session_id: Option<SessionId>,
}

impl SessionArgs {
    pub fn new(session_id: Option<SessionId>) -> Self {
        Self { session_id }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }
}

/// Args for the `ninja transactions` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct TransactionsArgs {
    #[clap(flatten)]
    session: SessionArgs,

    /// Only show transactions that contain this text in any column.
    #[arg(long)]
    search: Option<String>,

    /// Only show transactions whose column contains the value, e.g. --filter tag=food. Can be
    /// given more than once.
    #[arg(long = "filter", value_name = "COLUMN=VALUE")]
    filters: Vec<ColumnFilter>,

    /// Sort by this column: id, date, narration, product, amount, tag or mode.
    #[arg(long)]
    sort: Option<TransactionColumn>,

    /// Sort in descending order.
    #[arg(long, requires = "sort")]
    desc: bool,
}

impl TransactionsArgs {
    pub fn new(session: SessionArgs) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_filter(mut self, column: TransactionColumn, value: impl Into<String>) -> Self {
        self.filters.push(ColumnFilter {
            column,
            value: value.into(),
        });
        self
    }

    pub fn with_sort(mut self, column: TransactionColumn, desc: bool) -> Self {
        self.sort = Some(column);
        self.desc = desc;
        self
    }

    pub fn session(&self) -> &SessionArgs {
        &self.session
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn filters(&self) -> &[ColumnFilter] {
        &self.filters
    }

    pub fn sort(&self) -> Option<TransactionColumn> {
        self.sort
    }

    pub fn desc(&self) -> bool {
        self.desc
    }
}

/// A `COLUMN=VALUE` filter given on the command line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnFilter {
    column: TransactionColumn,
    value: String,
}

impl ColumnFilter {
    pub fn column(&self) -> TransactionColumn {
        self.column
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for ColumnFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((column, value)) = s.split_once('=') else {
            return Err(format!("Expected COLUMN=VALUE, got '{s}'"));
        };
        let column = TransactionColumn::from_str(column.trim())
            .map_err(|_| format!("Unknown column '{}'", column.trim()))?;
        Ok(Self {
            column,
            value: value.to_string(),
        })
    }
}

/// Args for the `ninja update-tag` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateTagArgs {
    #[clap(flatten)]
    session: SessionArgs,

    /// The id of the transaction to change.
    #[arg(long)]
    id: TransactionId,

    /// The new tag.
    #[arg(long)]
    tag: String,

    /// Also apply the tag to every transaction with the same product.
    #[arg(long)]
    apply_to_all: bool,
}

impl UpdateTagArgs {
    pub fn new(
        session: SessionArgs,
        id: TransactionId,
        tag: impl Into<String>,
        apply_to_all: bool,
    ) -> Self {
        Self {
            session,
            id,
            tag: tag.into(),
            apply_to_all,
        }
    }

    pub fn session(&self) -> &SessionArgs {
        &self.session
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn apply_to_all(&self) -> bool {
        self.apply_to_all
    }
}

/// Args for the `ninja update-product` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateProductArgs {
    #[clap(flatten)]
    session: SessionArgs,

    /// The id of the transaction to change.
    #[arg(long)]
    id: TransactionId,

    /// The new product name.
    #[arg(long)]
    product: String,

    /// Rename only this transaction (one) or every transaction with the same product (all).
    #[arg(long)]
    scope: CascadeScope,
}

impl UpdateProductArgs {
    pub fn new(
        session: SessionArgs,
        id: TransactionId,
        product: impl Into<String>,
        scope: CascadeScope,
    ) -> Self {
        Self {
            session,
            id,
            product: product.into(),
            scope,
        }
    }

    pub fn session(&self) -> &SessionArgs {
        &self.session
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn scope(&self) -> CascadeScope {
        self.scope
    }
}

fn default_ninja_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expense-ninja"),
        None => PathBuf::from("expense-ninja"),
    })
}

/// A `PathBuf` that can be used as a clap default value.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("ninja").chain(args.iter().copied()))
    }

    #[test]
    fn test_wizard_args() {
        let args = parse(&[
            "--ninja-home",
            "/tmp/ninja",
            "wizard",
            "--username",
            "earthwalker42",
            "--sample-statement",
            "--skip-tag-mapping",
            "--enable-ai",
        ])
        .unwrap();
        assert_eq!(args.common().ninja_home().path(), Path::new("/tmp/ninja"));
        let Command::Wizard(wizard) = args.command() else {
            panic!("expected the wizard command");
        };
        assert_eq!(wizard.username(), "earthwalker42");
        assert!(wizard.statement().path().is_none());
        assert!(wizard.tag_mapping().is_skip());
        assert!(wizard.enable_ai());
    }

    #[test]
    fn test_wizard_needs_exactly_one_statement() {
        assert!(parse(&["wizard", "--username", "x", "--skip-tag-mapping"]).is_err());
        assert!(parse(&[
            "wizard",
            "--username",
            "x",
            "--statement",
            "a.csv",
            "--sample-statement",
            "--skip-tag-mapping",
        ])
        .is_err());
    }

    #[test]
    fn test_transactions_args() {
        let args = parse(&[
            "transactions",
            "--session-id",
            "abc",
            "--filter",
            "tag=Food",
            "--filter",
            "product=swig",
            "--sort",
            "amount",
            "--desc",
        ])
        .unwrap();
        let Command::Transactions(list) = args.command() else {
            panic!("expected the transactions command");
        };
        assert_eq!(list.session().session_id().unwrap().as_str(), "abc");
        assert_eq!(list.filters().len(), 2);
        assert_eq!(list.filters()[0].column(), TransactionColumn::Tag);
        assert_eq!(list.filters()[1].value(), "swig");
        assert_eq!(list.sort(), Some(TransactionColumn::Amount));
        assert!(list.desc());
    }

    #[test]
    fn test_column_filter_parse() {
        let filter = ColumnFilter::from_str("narration=a=b").unwrap();
        assert_eq!(filter.column(), TransactionColumn::Narration);
        assert_eq!(filter.value(), "a=b");
        assert!(ColumnFilter::from_str("merchant=x").is_err());
        assert!(ColumnFilter::from_str("tag").is_err());
    }

    #[test]
    fn test_update_product_scope() {
        let args = parse(&[
            "update-product",
            "--session-id",
            "abc",
            "--id",
            "7",
            "--product",
            "Streaming",
            "--scope",
            "all",
        ])
        .unwrap();
        let Command::UpdateProduct(update) = args.command() else {
            panic!("expected the update-product command");
        };
        assert_eq!(update.scope(), CascadeScope::All);
        assert_eq!(update.id().as_str(), "7");
        assert!(parse(&["update-product", "--id", "7", "--product", "x", "--scope", "some"]).is_err());
    }
}
