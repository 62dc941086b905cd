mod commands;
mod handlers;

pub use commands::{
    Cli, Commands, NoteAction, NoteCommand, PageAction, PageCommand, ProductAction,
    ProductCommand,
};
pub use handlers::{
    handle_note_add, handle_note_delete, handle_note_edit, handle_note_list, handle_note_move,
    handle_page_add, handle_page_list, handle_product_add, handle_product_list,
};
