//! The `gradepath validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(gradebook_path: PathBuf) -> Result<()> {
    let books = if gradebook_path.is_dir() {
        gradepath_core::parser::load_gradebook_directory(&gradebook_path)?
    } else {
        vec![gradepath_core::parser::parse_gradebook(&gradebook_path)?]
    };

    let mut total_warnings = 0;

    for book in &books {
        println!(
            "Gradebook: {} ({} modules, {} activities, {} students)",
            book.course.title,
            book.modules.len(),
            book.activities.len(),
            book.students.len()
        );

        let warnings = gradepath_core::parser::validate_gradebook(book);
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All gradebooks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
