/// Render a simple aligned table for string rows.
#[must_use]
pub fn render_entity_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            rows.iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect();

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format_cell(header, *width, false))
        .collect::<Vec<_>>()
        .join("  ");
    let divider = "-".repeat(header_line.trim_end().len());

    let row_lines = rows.iter().map(|row| {
        widths
            .iter()
            .enumerate()
            .map(|(index, width)| {
                let value = row.get(index).map_or("-", String::as_str);
                format_cell(value, *width, looks_numeric(value))
            })
            .collect::<Vec<_>>()
            .join("  ")
    });

    let mut lines = vec![header_line.trim_end().to_string(), divider];
    lines.extend(row_lines.map(|line| line.trim_end().to_string()));
    lines.join("\n")
}

fn looks_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.'))
        && trimmed.chars().any(|ch| ch.is_ascii_digit())
}

fn format_cell(value: &str, width: usize, numeric: bool) -> String {
    let pad = width.saturating_sub(value.chars().count());
    if numeric {
        format!("{}{}", " ".repeat(pad), value)
    } else {
        format!("{}{}", value, " ".repeat(pad))
    }
}

#[cfg(test)]
mod tests {
    use super::render_entity_table;

    #[test]
    fn alignment_handles_mixed_widths() {
        let headers = ["id", "status", "remaining"];
        let rows = vec![
            vec!["top-1".to_string(), "open".to_string(), "3".to_string()],
            vec!["top-200".to_string(), "closed".to_string(), "12".to_string()],
        ];
        let table = render_entity_table(&headers, &rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id"));
        assert!(lines[1].chars().all(|c| c == '-'));
        // Numbers are right-aligned under their header.
        assert!(lines[2].ends_with("        3"));
        assert!(lines[3].ends_with("       12"));
    }
}
