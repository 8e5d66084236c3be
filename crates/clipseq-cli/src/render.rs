use clipseq_core::{Item, PasteStep, Payload, Session};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const PREVIEW_CHARS: usize = 60;

pub fn preview(s: &str) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// One-line summary of an item's content as shown in the history list.
pub fn summary(item: &Item) -> String {
    let mut s = match &item.payload {
        Payload::Text { text } => preview(text),
        Payload::Image { path } => format!("[Image] {}", basename(path)),
        Payload::Files { paths } if paths.len() == 1 => format!("[File] {}", paths[0]),
        Payload::Files { paths } => format!("[Files] {} items", paths.len()),
    };
    if item.count > 1 {
        s.push_str(&format!(" ×{}", item.count));
    }
    s
}

pub fn list_line(item: &Item) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        item.id,
        if item.is_favorite { "*" } else { " " },
        item.status,
        summary(item)
    )
}

pub fn timestamp(t: &OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.unix_timestamp().to_string())
}

pub fn detail(item: &Item) -> String {
    let mut out = String::new();
    out.push_str(&format!("id:        {}\n", item.id));
    out.push_str(&format!("kind:      {}\n", item.kind()));
    out.push_str(&format!("count:     {}\n", item.count));
    out.push_str(&format!("status:    {}\n", item.status));
    out.push_str(&format!("favorite:  {}\n", item.is_favorite));
    if let Some(session) = item.session_id {
        out.push_str(&format!("session:   {}\n", session));
    }
    out.push_str(&format!("created:   {}\n", timestamp(&item.created_at)));
    if let Some(used) = &item.last_used_at {
        out.push_str(&format!("last used: {}\n", timestamp(used)));
    }
    out.push('\n');
    match &item.payload {
        Payload::Text { text } => out.push_str(text),
        Payload::Image { path } => out.push_str(path),
        Payload::Files { paths } => out.push_str(&paths.join("\n")),
    }
    out
}

pub fn session_line(s: &Session) -> String {
    let closed = s
        .closed_at
        .as_ref()
        .map(timestamp)
        .unwrap_or_else(|| "open".to_string());
    format!("{}\t{}\t{}", s.id, timestamp(&s.started_at), closed)
}

pub fn step_line(step: &PasteStep) -> String {
    let ids = step
        .sources()
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    match step {
        PasteStep::Text { text, .. } => format!("text\t{}\t{}", ids, preview(text)),
        PasteStep::Image { path, .. } => format!("image\t{}\t{}", ids, path),
        PasteStep::Files { paths, .. } => format!("files\t{}\t{}", ids, paths.join(" ")),
    }
}
