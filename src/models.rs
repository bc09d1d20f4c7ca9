use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Store {
    Documents,
    Graph,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Documents => f.write_str("MongoDB"),
            Store::Graph => f.write_str("Neo4j"),
        }
    }
}

// ---- document store rows ----

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct YearCount {
    #[serde(rename = "_id")]
    pub year: i64,
    pub count: i64,
}

/// A film document after numeric normalization. Every field is optional
/// because the collection is schema-less.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FilmDoc {
    pub title: Option<String>,
    pub year: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub rating: Option<f64>,
    pub votes: Option<i64>,
    pub revenue: Option<f64>,
    pub runtime: Option<i64>,
    pub director: Option<String>,
    pub actors: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DirectorCount {
    #[serde(rename = "_id")]
    pub director: String,
    pub count: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GenreRevenue {
    #[serde(rename = "_id")]
    pub genre: String,
    #[serde(rename = "avgRevenue")]
    pub avg_revenue: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RatedTitle {
    pub title: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DecadeTop {
    #[serde(rename = "_id")]
    pub decade: i64,
    pub top3: Vec<RatedTitle>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LongestFilm {
    #[serde(rename = "_id")]
    pub genre: String,
    pub title: Option<String>,
    pub runtime: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DecadeRuntime {
    #[serde(rename = "_id")]
    pub decade: i64,
    #[serde(rename = "avgRuntime")]
    pub avg_runtime: f64,
}

/// Filter applied when picking a film for a set of genres.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenreCriteria {
    pub genres: Vec<String>,
    pub excluded_actor: String,
    pub min_rating: f64,
    pub min_votes: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenreMatch {
    pub film: FilmDoc,
    pub criteria: GenreCriteria,
}

// ---- graph store rows ----

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActorRevenue {
    pub actor: String,
    pub total_revenue: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphSuggestion {
    pub title: String,
    pub genre: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeSummary {
    pub rel_type: &'static str,
    pub total: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommunityMember {
    pub actor: String,
    pub community: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenrePair {
    pub film1: String,
    pub director1: String,
    pub film2: String,
    pub director2: String,
    pub genre: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Collaboration {
    pub actor: String,
    pub director: String,
    pub collaborations: i64,
    pub avg_revenue: Option<f64>,
    pub avg_votes: Option<f64>,
}
