//! Digest assembly: all of a project's qualifying events in one payload.
//!
//! The core guarantee lives here and in the scheduler: every event a
//! project accumulates during one pass goes out in a single mailer call,
//! and a project with zero events produces zero calls.

use crate::engine::events::UpdateEvent;
use crate::store::records::Project;

/// One outbound notification batch for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub project_name: String,
    pub recipients: Vec<String>,
    pub subject: String,
    /// True when every event describes something not yet shipped
    pub is_future_batch: bool,
    pub events: Vec<UpdateEvent>,
}

/// Build the digest for a project, or `None` when there is nothing to send
/// or nobody to send it to.
pub fn build_digest(project: &Project, events: Vec<UpdateEvent>) -> Option<Digest> {
    if events.is_empty() {
        return None;
    }
    let recipients = project.recipients();
    if recipients.is_empty() {
        return None;
    }

    // Subject fields come from the first event; the rest are counted.
    let first = &events[0];
    let mut subject_library = first.library().to_string();
    if events.len() > 1 {
        subject_library.push_str(&format!(" + {} others", events.len() - 1));
    }

    let is_future_batch = events.iter().all(UpdateEvent::is_future_flavored);
    let subject = if is_future_batch {
        format!(
            "Future update alert: {} {} planned",
            subject_library,
            first.version()
        )
    } else {
        format!("{} {} released", subject_library, first.version())
    };

    Some(Digest {
        project_name: project.name.clone(),
        recipients,
        subject,
        is_future_batch,
        events,
    })
}

/// Render the digest body as a small HTML table, one row per event.
pub fn render_html(digest: &Digest) -> String {
    let mut rows = String::new();
    for event in &digest.events {
        let source = if event.source().is_empty() {
            String::new()
        } else {
            format!(r#" <a href="{}">source</a>"#, event.source())
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}{}</td></tr>\n",
            event.library(),
            event.version(),
            event.category_label(),
            if event.date_label().is_empty() {
                "unknown"
            } else {
                event.date_label()
            },
            if event.summary().is_empty() {
                "No summary provided."
            } else {
                event.summary()
            },
            source,
        ));
    }

    format!(
        "<h2>Dependency updates for {}</h2>\n\
         <table border=\"1\" cellpadding=\"6\">\n\
         <tr><th>Library</th><th>Version</th><th>Category</th><th>Date</th><th>Summary</th></tr>\n\
         {rows}</table>\n",
        digest.project_name
    )
}
