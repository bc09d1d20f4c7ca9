use serde::Serialize;

use crate::models::FilmDoc;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Point {
    pub label: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Group {
    pub heading: String,
    pub items: Vec<String>,
}

/// What an operation produced, ready to be rendered as HTML or JSON.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Message { level: Level, text: String },
    List { items: Vec<String> },
    Table { columns: Vec<String>, rows: Vec<Vec<String>> },
    Bars { points: Vec<Point> },
    Line { points: Vec<Point> },
    Groups { groups: Vec<Group> },
    Record { heading: String, fields: Vec<(String, String)> },
    Path { nodes: Vec<String> },
    Many { parts: Vec<Outcome> },
}

impl Outcome {
    pub fn success(text: impl Into<String>) -> Self {
        Outcome::Message { level: Level::Success, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Outcome::Message { level: Level::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Outcome::Message { level: Level::Warning, text: text.into() }
    }

    /// A list, or `empty` as a warning when there is nothing to show.
    pub fn list_or(items: Vec<String>, empty: &str) -> Self {
        if items.is_empty() { Outcome::warning(empty) } else { Outcome::List { items } }
    }

    pub fn table<const N: usize>(columns: [&str; N], rows: Vec<[String; N]>) -> Self {
        Outcome::Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(Vec::from).collect(),
        }
    }

    pub fn film(heading: impl Into<String>, film: &FilmDoc) -> Self {
        let fields = vec![
            ("Title", film.title.clone().unwrap_or_else(|| "Unknown title".to_string())),
            ("Year", opt(film.year)),
            ("Genres", film.genres.join(", ")),
            ("Rating", opt(film.rating)),
            ("Votes", opt(film.votes)),
            ("Revenue (M$)", film.revenue.map(|r| format!("{r:.2}")).unwrap_or_else(na)),
            ("Runtime (min)", opt(film.runtime)),
            ("Director", film.director.clone().unwrap_or_else(na)),
            ("Cast", film.actors.clone().unwrap_or_else(na)),
        ];
        Outcome::Record {
            heading: heading.into(),
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }
}

fn na() -> String {
    "n/a".to_string()
}

pub fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(na)
}

pub fn opt_2dp(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(na)
}
