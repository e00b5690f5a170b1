//! Some utility functions

use std::io::Write;

use crate::item::TodoItem;

/// A debug utility that pretty-prints items
pub fn print_item_list<W: Write>(writer: &mut W, items: &[TodoItem]) -> std::io::Result<()> {
    for item in items {
        print_item(writer, item)?;
    }
    writeln!(writer, "{} item(s)", items.len())
}

pub fn print_item<W: Write>(writer: &mut W, item: &TodoItem) -> std::io::Result<()> {
    let completion = if item.completed() { "✓" } else { " " };
    writeln!(writer, "    {} {}\t{}\tdue {}\t[{}]",
        completion, item.task(), item.id(), item.due_date(), item.event_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::sample_item;

    #[test]
    fn print_items() {
        let mut done = sample_item(2, "Call Mom");
        done.mark_completed();
        let items = vec![sample_item(1, "Buy milk"), done];

        let mut out = Vec::new();
        print_item_list(&mut out, &items).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out,
            "      Buy milk\t1\tdue 03/15/2024\t[personal]\n    ✓ Call Mom\t2\tdue 03/15/2024\t[personal]\n2 item(s)\n");
    }
}
