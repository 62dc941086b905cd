use clap::Parser;
use food_diary::cli::{
    handle_note_add, handle_note_delete, handle_note_edit, handle_note_list, handle_note_move,
    handle_page_add, handle_page_list, handle_product_add, handle_product_list, Cli, Commands,
    NoteAction, PageAction, ProductAction,
};
use food_diary::DiaryConfig;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = DiaryConfig::from_env();
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let result = match cli.command {
        Commands::Product(product) => match product.action {
            ProductAction::Add {
                name,
                calories,
                json,
            } => handle_product_add(&config, name, calories, json),
            ProductAction::List { json } => handle_product_list(&config, json),
        },
        Commands::Page(page) => match page.action {
            PageAction::Add { date, json } => handle_page_add(&config, date, json),
            PageAction::List { json } => handle_page_list(&config, json),
        },
        Commands::Note(note) => match note.action {
            NoteAction::Add {
                page,
                meal,
                product,
                quantity,
                json,
            } => handle_note_add(&config, page, meal, product, quantity, json),
            NoteAction::Edit {
                id,
                product,
                quantity,
                json,
            } => handle_note_edit(&config, id, product, quantity, json),
            NoteAction::List { page, meal, json } => handle_note_list(&config, page, meal, json),
            NoteAction::Delete { ids, force, json } => handle_note_delete(&config, ids, force, json),
            NoteAction::Move {
                id,
                meal,
                position,
                json,
            } => handle_note_move(&config, id, meal, position, json),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
