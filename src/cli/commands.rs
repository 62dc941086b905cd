use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "food-diary")]
#[command(version, about = "A food diary with ordered meal notes")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file (overrides FOOD_DIARY_DB)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage products
    Product(ProductCommand),

    /// Manage diary pages
    Page(PageCommand),

    /// Manage notes on a page
    Note(NoteCommand),
}

#[derive(Args, Debug)]
pub struct ProductCommand {
    #[command(subcommand)]
    pub action: ProductAction,
}

#[derive(Subcommand, Debug)]
pub enum ProductAction {
    /// Register a product
    Add {
        /// Product name
        name: String,

        /// Calories per 100 grams
        #[arg(long)]
        calories: i32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List products
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PageCommand {
    #[command(subcommand)]
    pub action: PageAction,
}

#[derive(Subcommand, Debug)]
pub enum PageAction {
    /// Create the page for a date
    Add {
        /// Date in YYYY-MM-DD format
        date: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List pages
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct NoteCommand {
    #[command(subcommand)]
    pub action: NoteAction,
}

#[derive(Subcommand, Debug)]
pub enum NoteAction {
    /// Append a note to a meal
    Add {
        /// Page ID
        #[arg(long)]
        page: i64,

        /// Meal (breakfast, second_breakfast, lunch, afternoon_snack, dinner)
        #[arg(long)]
        meal: String,

        /// Product ID
        #[arg(long)]
        product: i64,

        /// Quantity in grams
        #[arg(long)]
        quantity: i32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change the product or quantity of a note
    Edit {
        /// Note ID
        id: i64,

        /// Product ID
        #[arg(long)]
        product: i64,

        /// Quantity in grams
        #[arg(long)]
        quantity: i32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the notes of a page
    List {
        /// Page ID
        #[arg(long)]
        page: i64,

        /// Only show one meal
        #[arg(long)]
        meal: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete one or more notes
    Delete {
        /// Note IDs
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a note to a position within a meal of the same page
    Move {
        /// Note ID
        id: i64,

        /// Destination meal
        #[arg(long)]
        meal: String,

        /// Zero-based position in the destination meal
        #[arg(long, allow_hyphen_values = true)]
        position: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
