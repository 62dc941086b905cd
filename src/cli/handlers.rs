use std::collections::HashMap;
use std::io;

use chrono::NaiveDate;

use crate::config::DiaryConfig;
use crate::entity::{MealType, Note, NoteDraft, NoteEdit};
use crate::error::{DiaryError, Result};
use crate::lifecycle::{with_conflict_retry, MoveRequest, NoteLifecycle};
use crate::store::DiaryStore;

fn open_store(config: &DiaryConfig) -> Result<DiaryStore> {
    DiaryStore::open(config)
}

fn parse_meal(raw: &str) -> Result<MealType> {
    raw.parse()
        .map_err(|e: String| DiaryError::validation("MealType", e))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        DiaryError::validation("Date", format!("Invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

pub fn handle_product_add(
    config: &DiaryConfig,
    name: String,
    calories: i32,
    json: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let product = store.add_product(&name, calories)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&product)?);
    } else {
        println!(
            "Created product {} - {} ({} kcal/100g)",
            product.id, product.name, product.calories_cost
        );
    }
    Ok(())
}

pub fn handle_product_list(config: &DiaryConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let products = store.list_products()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products found.");
    }
    for product in &products {
        println!(
            "{:>4}  {} ({} kcal/100g)",
            product.id, product.name, product.calories_cost
        );
    }
    Ok(())
}

pub fn handle_page_add(config: &DiaryConfig, date: String, json: bool) -> Result<()> {
    let date = parse_date(&date)?;
    let store = open_store(config)?;
    let page = store.add_page(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        println!("Created page {} for {}", page.id, page.date);
    }
    Ok(())
}

pub fn handle_page_list(config: &DiaryConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let pages = store.list_pages()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pages)?);
        return Ok(());
    }

    if pages.is_empty() {
        println!("No pages found.");
    }
    for page in &pages {
        println!("{:>4}  {}", page.id, page.date);
    }
    Ok(())
}

pub fn handle_note_add(
    config: &DiaryConfig,
    page: i64,
    meal: String,
    product: i64,
    quantity: i32,
    json: bool,
) -> Result<()> {
    let draft = NoteDraft {
        page_id: page,
        meal_type: parse_meal(&meal)?,
        product_id: product,
        product_quantity: quantity,
    };

    let mut store = open_store(config)?;
    let note = with_conflict_retry(config.conflict_retries, || {
        NoteLifecycle::new(&mut store, config).create_note(&draft)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!(
            "Created note {} in {} at position {}",
            note.id, note.meal_type, note.display_order
        );
    }
    Ok(())
}

pub fn handle_note_edit(
    config: &DiaryConfig,
    id: i64,
    product: i64,
    quantity: i32,
    json: bool,
) -> Result<()> {
    let edit = NoteEdit {
        product_id: product,
        product_quantity: quantity,
    };

    let mut store = open_store(config)?;
    let note = with_conflict_retry(config.conflict_retries, || {
        NoteLifecycle::new(&mut store, config).edit_note(id, &edit)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!("Updated note {}", note.id);
    }
    Ok(())
}

pub fn handle_note_list(
    config: &DiaryConfig,
    page: i64,
    meal: Option<String>,
    json: bool,
) -> Result<()> {
    let meal = meal.as_deref().map(parse_meal).transpose()?;
    let mut store = open_store(config)?;
    let product_names: HashMap<i64, String> = store
        .list_products()?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();
    let notes = NoteLifecycle::new(&mut store, config).notes_for_page(page, meal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes found.");
        return Ok(());
    }

    print_grouped(&notes, &product_names);
    Ok(())
}

fn print_grouped(notes: &[Note], product_names: &HashMap<i64, String>) {
    let mut current: Option<MealType> = None;
    for note in notes {
        if current != Some(note.meal_type) {
            println!("{}", note.meal_type);
            current = Some(note.meal_type);
        }
        let product = product_names
            .get(&note.product_id)
            .map(String::as_str)
            .unwrap_or("?");
        println!(
            "  {}. [{}] {} - {} g",
            note.display_order, note.id, product, note.product_quantity
        );
    }
}

pub fn handle_note_delete(
    config: &DiaryConfig,
    ids: Vec<i64>,
    force: bool,
    json: bool,
) -> Result<()> {
    // Confirm deletion unless --force is used
    if !force {
        eprintln!("Delete {} note(s)? [y/N] ", ids.len());

        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
        } else {
            return Err(DiaryError::validation(
                "",
                "Use --force to delete in non-interactive mode",
            ));
        }
    }

    let mut store = open_store(config)?;
    let report = with_conflict_retry(config.conflict_retries, || {
        let mut lifecycle = NoteLifecycle::new(&mut store, config);
        match ids.as_slice() {
            [id] => lifecycle.delete_note(*id),
            many => lifecycle.delete_notes(many),
        }
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Deleted {} note(s), reordered {}",
            report.notes_removed, report.ordering_writes
        );
    }
    Ok(())
}

pub fn handle_note_move(
    config: &DiaryConfig,
    id: i64,
    meal: String,
    position: i64,
    json: bool,
) -> Result<()> {
    let request = MoveRequest {
        note_id: id,
        dest_meal: parse_meal(&meal)?,
        position,
    };

    let mut store = open_store(config)?;
    let report = with_conflict_retry(config.conflict_retries, || {
        NoteLifecycle::new(&mut store, config).move_note(&request)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.ordering_writes == 0 {
        println!("Note {} is already at position {}", id, position);
    } else {
        println!(
            "Moved note {} to {} position {} ({} notes reordered)",
            id, request.dest_meal, position, report.ordering_writes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meal_reports_field() {
        let err = parse_meal("brunch").unwrap_err();
        assert!(matches!(err, DiaryError::Validation { ref key, .. } if key == "MealType"));
        assert_eq!(parse_meal("dinner").unwrap(), MealType::Dinner);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("29/02/2024").is_err());
    }
}
