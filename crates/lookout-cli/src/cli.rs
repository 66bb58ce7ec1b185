use clap::{Args, Parser, Subcommand, ValueEnum};

use lookout_core::{AlertFrequency, FilterSpec, PriceRange, YearRange, VERSION};

/// Lookout - saved-search matching and alerting for a vehicle marketplace
#[derive(Parser)]
#[command(name = "lookout")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the search database (overrides the config file)
    #[arg(long, global = true, env = "LOOKOUT_DB")]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file
    Init(InitArgs),

    /// Create a saved search
    Create(CreateArgs),

    /// List a user's saved searches
    List(ListArgs),

    /// Show one saved search
    Show(ShowArgs),

    /// Edit a saved search
    Update(UpdateArgs),

    /// Delete a saved search
    Delete(DeleteArgs),

    /// Check a saved search now, bypassing its alert cadence
    Check(CheckArgs),

    /// Show matching listings, newest first, and acknowledge new matches
    Results(ResultsArgs),

    /// Total unread matches for a user
    Badge(BadgeArgs),

    /// Run the alert scheduler until interrupted
    Watch(WatchArgs),
}

/// Alert cadence as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Instant,
    Daily,
    Weekly,
}

impl From<FrequencyArg> for AlertFrequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Instant => AlertFrequency::Instant,
            FrequencyArg::Daily => AlertFrequency::Daily,
            FrequencyArg::Weekly => AlertFrequency::Weekly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

/// Filter criteria shared by `create` and `update`
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Free-text query matched against title and description
    #[arg(long)]
    pub query: Option<String>,

    /// Brand (repeatable)
    #[arg(long, value_name = "BRAND")]
    pub brand: Vec<String>,

    /// Fuel type (repeatable)
    #[arg(long, value_name = "FUEL")]
    pub fuel: Vec<String>,

    /// Transmission (repeatable)
    #[arg(long, value_name = "TRANSMISSION")]
    pub transmission: Vec<String>,

    /// Location (repeatable)
    #[arg(long, value_name = "LOCATION")]
    pub location: Vec<String>,

    /// Condition (repeatable)
    #[arg(long, value_name = "CONDITION")]
    pub condition: Vec<String>,

    #[arg(long)]
    pub min_price: Option<f64>,

    #[arg(long)]
    pub max_price: Option<f64>,

    #[arg(long)]
    pub min_year: Option<i32>,

    #[arg(long)]
    pub max_year: Option<i32>,
}

impl FilterArgs {
    /// True when no filter flag was given.
    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.brand.is_empty()
            && self.fuel.is_empty()
            && self.transmission.is_empty()
            && self.location.is_empty()
            && self.condition.is_empty()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_year.is_none()
            && self.max_year.is_none()
    }

    /// Build the filter. A range with only one bound is open on the other
    /// side.
    pub fn to_filter_spec(&self) -> FilterSpec {
        let mut filters = FilterSpec {
            search_query: self.query.clone(),
            brands: self.brand.iter().cloned().collect(),
            fuel_types: self.fuel.iter().cloned().collect(),
            transmissions: self.transmission.iter().cloned().collect(),
            locations: self.location.iter().cloned().collect(),
            conditions: self.condition.iter().cloned().collect(),
            ..FilterSpec::default()
        };
        if self.min_price.is_some() || self.max_price.is_some() {
            filters.price_range = Some(PriceRange {
                min: self.min_price.unwrap_or(0.0),
                max: self.max_price.unwrap_or(f64::MAX),
            });
        }
        if self.min_year.is_some() || self.max_year.is_some() {
            filters.year_range = Some(YearRange {
                min: self.min_year.unwrap_or(i32::MIN),
                max: self.max_year.unwrap_or(i32::MAX),
            });
        }
        filters
    }
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Listings JSON file used as the listing index
    #[arg(long, value_name = "PATH")]
    pub listings: Option<String>,

    /// Append notifications to this JSONL file instead of only logging them
    #[arg(long, value_name = "PATH")]
    pub outbox: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `create` command
#[derive(Args)]
pub struct CreateArgs {
    /// Owner of the search
    #[arg(long)]
    pub user: String,

    /// Display name (1-50 characters)
    #[arg(long)]
    pub name: String,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Alert cadence
    #[arg(long, value_enum, default_value_t = FrequencyArg::Instant)]
    pub frequency: FrequencyArg,

    /// Create with alerts disabled
    #[arg(long)]
    pub no_alerts: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub user: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `show` command
#[derive(Args)]
pub struct ShowArgs {
    #[arg(long)]
    pub user: String,

    /// Search ID (full UUID or a unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `update` command
#[derive(Args)]
pub struct UpdateArgs {
    #[arg(long)]
    pub user: String,

    /// Search ID (full UUID or a unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,

    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// Turn alerts on or off
    #[arg(long, value_enum)]
    pub alerts: Option<Toggle>,

    /// New alert cadence
    #[arg(long, value_enum)]
    pub frequency: Option<FrequencyArg>,

    /// Any filter flag replaces the whole filter
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `delete` command
#[derive(Args)]
pub struct DeleteArgs {
    #[arg(long)]
    pub user: String,

    /// Search ID (full UUID or a unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for the `check` command
#[derive(Args)]
pub struct CheckArgs {
    #[arg(long)]
    pub user: String,

    /// Search ID (full UUID or a unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `results` command
#[derive(Args)]
pub struct ResultsArgs {
    #[arg(long)]
    pub user: String,

    /// Search ID (full UUID or a unique prefix)
    #[arg(value_name = "ID")]
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `badge` command
#[derive(Args)]
pub struct BadgeArgs {
    #[arg(long)]
    pub user: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `watch` command
#[derive(Args)]
pub struct WatchArgs {
    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,

    /// Output the tick report as JSON (with --once)
    #[arg(long)]
    pub json: bool,
}
