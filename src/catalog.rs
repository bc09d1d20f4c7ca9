//! Registry of every dashboard operation.
//!
//! Each entry maps an id to a label, the section it is shown in, the inputs
//! its form needs and a handler. Routes never branch on the operation; they
//! look it up here and call [`execute`].

use std::{collections::HashMap, time::Duration, time::Instant};

use futures::{FutureExt, future::BoxFuture};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    models::NameCount,
    mongo::FilmStore,
    neo4j::GraphStore,
    outcome::{Group, Outcome, Point, opt, opt_2dp},
    recommender::{self, Recommendation},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Documents,
    Graph,
    Cross,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Documents, Section::Graph, Section::Cross];

    pub fn slug(self) -> &'static str {
        match self {
            Section::Documents => "documents",
            Section::Graph => "graph",
            Section::Cross => "cross",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::Documents => "MongoDB exploration",
            Section::Graph => "Neo4j exploration",
            Section::Cross => "Cross-source analysis",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Section::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Actor,
    Director,
    /// Integer field; values below `min` are rejected.
    Number { default: i64, min: i64 },
}

#[derive(Clone, Copy, Debug)]
pub struct Input {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: InputKind,
}

const fn number(name: &'static str, label: &'static str, default: i64, min: i64) -> Input {
    Input { name, label, kind: InputKind::Number { default, min } }
}

const ACTOR: Input = Input { name: "actor", label: "Actor", kind: InputKind::Actor };
const OTHER_ACTOR: Input = Input { name: "other_actor", label: "Second actor", kind: InputKind::Actor };
const DIRECTOR: Input = Input { name: "director", label: "Director", kind: InputKind::Director };
const AFTER_YEAR: Input = number("year", "After year", 1999, 0);
const VOTES_YEAR: Input = number("year", "Year", 2007, 0);
const MIN_FILMS: Input = number("more_than", "More than (films)", 5, 0);
const TOP_FIVE: Input = number("limit", "How many", 5, 1);
const TOP_TEN: Input = number("limit", "How many", 10, 1);
const TOP_GENRES: Input = number("limit", "How many genres", 3, 1);
const MIN_COLLABORATIONS: Input = number("min", "Minimum collaborations", 1, 1);

/// Long-lived store handles shared by every request.
pub struct Services {
    pub films: FilmStore,
    pub graph: GraphStore,
    pub query_timeout: Duration,
}

/// Submitted form values.
#[derive(Clone, Debug, Default)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// Non-blank values as a URL query string, keys sorted.
    pub fn query_string(&self) -> String {
        let mut pairs: Vec<(&str, &str)> =
            self.0.keys().filter_map(|k| self.get(k).map(|v| (k.as_str(), v))).collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn text(&self, input: &Input) -> AppResult<&str> {
        self.get(input.name).ok_or(AppError::MissingInput(input.name))
    }

    pub fn number(&self, input: &Input) -> AppResult<i64> {
        let (default, min) = match input.kind {
            InputKind::Number { default, min } => (default, min),
            _ => (0, i64::MIN),
        };
        let Some(raw) = self.get(input.name) else {
            return Ok(default);
        };
        let invalid = || AppError::InvalidInput { field: input.name, value: raw.to_string() };
        let value: i64 = raw.parse().map_err(|_| invalid())?;
        if value < min {
            return Err(invalid());
        }
        Ok(value)
    }
}

pub type Handler = for<'a> fn(&'a Services, &'a Params) -> BoxFuture<'a, AppResult<Outcome>>;

pub struct Operation {
    pub id: &'static str,
    pub label: &'static str,
    pub section: Section,
    pub inputs: &'static [Input],
    handler: Handler,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").field("id", &self.id).field("section", &self.section).finish()
    }
}

macro_rules! op {
    ($id:literal, $label:literal, $section:ident, [$($input:ident),*], $handler:ident) => {
        Operation {
            id: $id,
            label: $label,
            section: Section::$section,
            inputs: &[$($input),*],
            handler: $handler,
        }
    };
}

pub static OPERATIONS: &[Operation] = &[
    op!("most-common-year", "Year with the most films", Documents, [], most_common_year),
    op!("count-after-year", "Number of films released after a year", Documents, [AFTER_YEAR], count_after_year),
    op!("average-votes-in-year", "Average votes in a year", Documents, [VOTES_YEAR], average_votes_in_year),
    op!("films-per-year", "Films per year", Documents, [], films_per_year),
    op!("genres", "Available genres", Documents, [], genres),
    op!("top-revenue-film", "Highest-grossing film", Documents, [], top_revenue_film),
    op!("prolific-directors", "Directors with more than 5 films", Documents, [MIN_FILMS], prolific_directors),
    op!("best-genre-by-revenue", "Genre with the best average revenue", Documents, [], best_genre_by_revenue),
    op!("top-rated-per-decade", "Top 3 rated films per decade", Documents, [], top_rated_per_decade),
    op!("longest-film-per-genre", "Longest film per genre", Documents, [], longest_film_per_genre),
    op!("create-high-score-view", "Create the high-score view (rating > 8, revenue > 50M)", Documents, [], create_high_score_view),
    op!("runtime-revenue-correlation", "Runtime / revenue correlation", Documents, [], runtime_revenue_correlation),
    op!("average-runtime-by-decade", "Average runtime by decade", Documents, [], average_runtime_by_decade),
    op!("ping", "Check the MongoDB connection", Documents, [], document_ping),
    op!("graph-ping", "Check the Neo4j connection", Graph, [], graph_ping),
    op!("list-films", "Films (first 50)", Graph, [], list_films),
    op!("list-directors", "Directors", Graph, [], list_directors),
    op!("list-actors", "Actors", Graph, [], list_actors),
    op!("films-by-director", "Films by director", Graph, [DIRECTOR], films_by_director),
    op!("most-active-actor", "Most active actor", Graph, [], most_active_actor),
    op!("co-actors", "Actors who played with", Graph, [ACTOR], co_actors),
    op!("top-grossing-actor", "Top-grossing actor", Graph, [], top_grossing_actor),
    op!("average-votes", "Average votes across films", Graph, [], average_votes),
    op!("most-common-genre", "Most common genre", Graph, [], most_common_genre),
    op!("co-actor-films", "Films played by co-actors", Graph, [ACTOR], co_actor_films),
    op!("director-most-actors", "Director with the most distinct actors", Graph, [], director_most_actors),
    op!("most-connected-films", "Films with the most actors", Graph, [TOP_FIVE], most_connected_films),
    op!("actors-most-directors", "Actors with the most directors", Graph, [TOP_FIVE], actors_most_directors),
    op!("recommend-by-genre", "Recommend a film from the actor's favourite genre", Graph, [ACTOR], recommend_by_genre),
    op!("create-influence-edges", "Create INFLUENCE_PAR between directors", Graph, [], create_influence_edges),
    op!("shortest-path", "Shortest path between two actors", Graph, [ACTOR, OTHER_ACTOR], shortest_path),
    op!("create-collaboration-edges", "Create A_JOUE_AVEC between actors", Graph, [], create_collaboration_edges),
    op!("actor-communities", "Actor communities (Louvain)", Graph, [], actor_communities),
    op!("common-genre-pairs", "Films sharing a genre, different directors", Graph, [TOP_TEN], common_genre_pairs),
    op!("preferred-genres", "Preferred genres of an actor", Graph, [ACTOR, TOP_GENRES], preferred_genres),
    op!("create-concurrence-edges", "Create CONCURRENCE between directors", Graph, [], create_concurrence_edges),
    op!("frequent-collaborations", "Actor / director collaborations", Graph, [MIN_COLLABORATIONS], frequent_collaborations),
    op!("recommend", "Recommend a film for an actor", Cross, [ACTOR], recommend),
];

pub fn find(id: &str) -> AppResult<&'static Operation> {
    OPERATIONS.iter().find(|op| op.id == id).ok_or_else(|| AppError::UnknownOperation(id.to_string()))
}

pub fn in_section(section: Section) -> impl Iterator<Item = &'static Operation> {
    OPERATIONS.iter().filter(move |op| op.section == section)
}

/// Runs one operation under the configured query timeout.
pub async fn execute(services: &Services, op: &Operation, params: &Params) -> AppResult<Outcome> {
    let started = Instant::now();
    let result = match tokio::time::timeout(services.query_timeout, (op.handler)(services, params)).await
    {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: op.id.to_string(),
            seconds: services.query_timeout.as_secs(),
        }),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(operation = op.id, elapsed_ms, "operation finished"),
        Err(err) => warn!(operation = op.id, elapsed_ms, error = %err, "operation failed"),
    }
    result
}

fn counts(rows: Vec<NameCount>, name: &str, count: &str) -> Outcome {
    if rows.is_empty() {
        return Outcome::warning("No results.");
    }
    Outcome::table([name, count], rows.into_iter().map(|r| [r.name, r.count.to_string()]).collect())
}

// ---- MongoDB ----

fn most_common_year<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.films.most_common_year().await? {
            Some(y) => Outcome::success(format!("Year {} with {} films.", y.year, y.count)),
            None => Outcome::warning("No film has a release year."),
        })
    }
    .boxed()
}

fn count_after_year<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let year = p.number(&AFTER_YEAR)?;
        let count = s.films.count_after_year(year).await?;
        Ok(Outcome::info(format!("Films released after {year}: {count}")))
    }
    .boxed()
}

fn average_votes_in_year<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let year = p.number(&VOTES_YEAR)?;
        Ok(match s.films.average_votes_in_year(year).await? {
            Some(avg) => Outcome::info(format!("Average votes ({year}): {avg:.2}")),
            None => Outcome::warning(format!("No film from {year} has a vote count.")),
        })
    }
    .boxed()
}

fn films_per_year<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let rows = s.films.films_per_year().await?;
        if rows.is_empty() {
            return Ok(Outcome::warning("No film has a release year."));
        }
        Ok(Outcome::Bars {
            points: rows
                .into_iter()
                .map(|r| Point { label: r.year.to_string(), value: r.count as f64 })
                .collect(),
        })
    }
    .boxed()
}

fn genres<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move { Ok(Outcome::list_or(s.films.genres().await?, "No genres recorded.")) }.boxed()
}

fn top_revenue_film<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.films.top_revenue_film().await? {
            Some(film) => Outcome::film("Highest-grossing film", &film),
            None => Outcome::warning("No film has a recorded revenue."),
        })
    }
    .boxed()
}

fn prolific_directors<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let more_than = p.number(&MIN_FILMS)?;
        let rows = s.films.prolific_directors(more_than).await?;
        if rows.is_empty() {
            return Ok(Outcome::warning(format!("No director has more than {more_than} films.")));
        }
        Ok(Outcome::table(
            ["Director", "Films"],
            rows.into_iter().map(|r| [r.director, r.count.to_string()]).collect(),
        ))
    }
    .boxed()
}

fn best_genre_by_revenue<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.films.best_genre_by_revenue().await? {
            Some(g) => Outcome::success(format!(
                "Genre: {} – average revenue: {:.2} M$",
                g.genre.trim(),
                g.avg_revenue
            )),
            None => Outcome::warning("No genre has films with a valid revenue."),
        })
    }
    .boxed()
}

fn top_rated_per_decade<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let decades = s.films.top_rated_per_decade().await?;
        if decades.is_empty() {
            return Ok(Outcome::warning("No rated film has a release year."));
        }
        Ok(Outcome::Groups {
            groups: decades
                .into_iter()
                .map(|d| Group {
                    heading: format!("{}s", d.decade),
                    items: d
                        .top3
                        .into_iter()
                        .map(|f| {
                            format!(
                                "{} ({})",
                                f.title.unwrap_or_else(|| "Unknown title".to_string()),
                                f.rating.map(|r| r.to_string()).unwrap_or_else(|| "unrated".to_string())
                            )
                        })
                        .collect(),
                })
                .collect(),
        })
    }
    .boxed()
}

fn longest_film_per_genre<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let rows = s.films.longest_film_per_genre().await?;
        if rows.is_empty() {
            return Ok(Outcome::warning("No film has a recorded runtime."));
        }
        Ok(Outcome::table(
            ["Genre", "Film", "Runtime (min)"],
            rows.into_iter()
                .map(|r| {
                    [
                        r.genre.trim().to_string(),
                        r.title.unwrap_or_else(|| "Unknown title".to_string()),
                        r.runtime.to_string(),
                    ]
                })
                .collect(),
        ))
    }
    .boxed()
}

fn create_high_score_view<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let total = s.films.create_high_score_view().await?;
        Ok(Outcome::success(format!(
            "High-score view is up to date: {total} films with rating > 8 and revenue > 50M."
        )))
    }
    .boxed()
}

fn runtime_revenue_correlation<'a>(
    s: &'a Services,
    _: &'a Params,
) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.films.runtime_revenue_correlation().await? {
            Some(r) => Outcome::info(format!("Correlation (runtime vs revenue): {r:.3}")),
            None => Outcome::warning("Not enough data to compute the correlation."),
        })
    }
    .boxed()
}

fn average_runtime_by_decade<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let rows = s.films.average_runtime_by_decade().await?;
        if rows.is_empty() {
            return Ok(Outcome::warning("No film has both a year and a runtime."));
        }
        Ok(Outcome::Line {
            points: rows
                .into_iter()
                .map(|r| Point { label: r.decade.to_string(), value: r.avg_runtime })
                .collect(),
        })
    }
    .boxed()
}

fn document_ping<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        s.films.ping().await?;
        Ok(Outcome::success("Connected to MongoDB."))
    }
    .boxed()
}

// ---- Neo4j ----

fn graph_ping<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move { Ok(Outcome::success(s.graph.ping().await?)) }.boxed()
}

fn list_films<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move { Ok(Outcome::list_or(s.graph.list_films().await?, "No films in the graph.")) }.boxed()
}

fn list_directors<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move { Ok(Outcome::list_or(s.graph.list_directors().await?, "No directors in the graph.")) }
        .boxed()
}

fn list_actors<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move { Ok(Outcome::list_or(s.graph.list_actors().await?, "No actors in the graph.")) }.boxed()
}

fn films_by_director<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let director = p.text(&DIRECTOR)?;
        let films = s.graph.films_by_director(director).await?;
        Ok(Outcome::list_or(films, &format!("No films found for {director}.")))
    }
    .boxed()
}

fn most_active_actor<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.graph.most_active_actor().await? {
            Some(a) => Outcome::success(format!("{} played in {} films.", a.name, a.count)),
            None => Outcome::warning("No actor has played in a film."),
        })
    }
    .boxed()
}

fn co_actors<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let actor = p.text(&ACTOR)?;
        let names = s.graph.co_actors(actor).await?;
        Ok(Outcome::list_or(names, &format!("No co-actors found for {actor}.")))
    }
    .boxed()
}

fn top_grossing_actor<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.graph.top_grossing_actor().await? {
            Some(a) => Outcome::success(format!(
                "{} – total revenue: {:.2} M$",
                a.actor, a.total_revenue
            )),
            None => Outcome::warning("No film in the graph has a revenue."),
        })
    }
    .boxed()
}

fn average_votes<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.graph.average_votes().await? {
            Some(avg) => Outcome::info(format!("Average votes: {avg:.2}")),
            None => Outcome::warning("No film in the graph has a vote count."),
        })
    }
    .boxed()
}

fn most_common_genre<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.graph.most_common_genre().await? {
            Some(g) => Outcome::success(format!("{} with {} films.", g.name, g.count)),
            None => Outcome::warning("No film is linked to a genre."),
        })
    }
    .boxed()
}

fn co_actor_films<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let actor = p.text(&ACTOR)?;
        let films = s.graph.co_actor_films(actor).await?;
        Ok(Outcome::list_or(films, &format!("No co-actor films found for {actor}.")))
    }
    .boxed()
}

fn director_most_actors<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        Ok(match s.graph.director_with_most_actors().await? {
            Some(d) => Outcome::success(format!("{} worked with {} distinct actors.", d.name, d.count)),
            None => Outcome::warning("No director has a cast in the graph."),
        })
    }
    .boxed()
}

fn most_connected_films<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let limit = p.number(&TOP_FIVE)?;
        Ok(counts(s.graph.most_connected_films(limit).await?, "Film", "Actors"))
    }
    .boxed()
}

fn actors_most_directors<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let limit = p.number(&TOP_FIVE)?;
        Ok(counts(s.graph.actors_with_most_directors(limit).await?, "Actor", "Directors"))
    }
    .boxed()
}

fn recommend_by_genre<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let actor = p.text(&ACTOR)?;
        Ok(match s.graph.recommend_by_genre(actor).await? {
            Some(r) => Outcome::success(format!("Recommended for {actor}: {} ({})", r.title, r.genre)),
            None => Outcome::warning(format!("No recommendation found for {actor}.")),
        })
    }
    .boxed()
}

fn create_influence_edges<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let edges = s.graph.create_influence_edges().await?;
        Ok(Outcome::success(format!(
            "INFLUENCE_PAR relationships between directors sharing a genre: {} in total.",
            edges.total
        )))
    }
    .boxed()
}

fn shortest_path<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let from = p.text(&ACTOR)?;
        let to = p.text(&OTHER_ACTOR)?;
        Ok(match s.graph.shortest_path(from, to).await? {
            Some(nodes) => Outcome::Path { nodes },
            None => Outcome::warning(format!("No path between {from} and {to}.")),
        })
    }
    .boxed()
}

fn create_collaboration_edges<'a>(
    s: &'a Services,
    _: &'a Params,
) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let edges = s.graph.create_collaboration_edges().await?;
        Ok(Outcome::success(format!(
            "A_JOUE_AVEC relationships between actors who shared a film: {} in total.",
            edges.total
        )))
    }
    .boxed()
}

fn actor_communities<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let members = s.graph.actor_communities().await?;
        if members.is_empty() {
            return Ok(Outcome::warning(
                "No communities found. Create the A_JOUE_AVEC relationships first.",
            ));
        }
        Ok(Outcome::table(
            ["Community", "Actor"],
            members.into_iter().map(|m| [m.community.to_string(), m.actor]).collect(),
        ))
    }
    .boxed()
}

fn common_genre_pairs<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let limit = p.number(&TOP_TEN)?;
        let pairs = s.graph.common_genre_pairs(limit).await?;
        if pairs.is_empty() {
            return Ok(Outcome::warning("No films share a genre across directors."));
        }
        Ok(Outcome::table(
            ["Film", "Director", "Film", "Director", "Genre"],
            pairs
                .into_iter()
                .map(|pair| [pair.film1, pair.director1, pair.film2, pair.director2, pair.genre])
                .collect(),
        ))
    }
    .boxed()
}

fn preferred_genres<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let actor = p.text(&ACTOR)?;
        let limit = p.number(&TOP_GENRES)?;
        let genres = s.graph.preferred_genres(actor, limit).await?;
        Ok(Outcome::list_or(genres, &format!("No genre history for {actor}.")))
    }
    .boxed()
}

fn create_concurrence_edges<'a>(s: &'a Services, _: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let edges = s.graph.create_concurrence_edges().await?;
        Ok(Outcome::success(format!(
            "CONCURRENCE relationships between directors with same-year films in a shared genre: {} in total.",
            edges.total
        )))
    }
    .boxed()
}

fn frequent_collaborations<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let min = p.number(&MIN_COLLABORATIONS)?;
        let rows = s.graph.frequent_collaborations(min).await?;
        if rows.is_empty() {
            return Ok(Outcome::warning(format!("No pair worked together {min} times or more.")));
        }
        Ok(Outcome::table(
            ["Actor", "Director", "Films", "Avg revenue (M$)", "Avg votes"],
            rows.into_iter()
                .map(|c| {
                    [
                        c.actor,
                        c.director,
                        c.collaborations.to_string(),
                        opt_2dp(c.avg_revenue),
                        opt_2dp(c.avg_votes),
                    ]
                })
                .collect(),
        ))
    }
    .boxed()
}

// ---- cross-source ----

fn recommend<'a>(s: &'a Services, p: &'a Params) -> BoxFuture<'a, AppResult<Outcome>> {
    async move {
        let actor = p.text(&ACTOR)?;
        let rec = recommender::recommend(&s.graph, &s.films, actor).await?;
        Ok(recommendation_outcome(rec))
    }
    .boxed()
}

fn recommendation_outcome(rec: Recommendation) -> Outcome {
    fn criteria_record(c: &crate::models::GenreCriteria) -> Outcome {
        Outcome::Record {
            heading: "Criteria".to_string(),
            fields: vec![
                ("Preferred genres (Neo4j)".to_string(), c.genres.join(", ")),
                ("Excluded actor".to_string(), c.excluded_actor.clone()),
                ("Minimum rating".to_string(), format!("{:.1}", c.min_rating)),
                ("Minimum votes".to_string(), opt(Some(c.min_votes))),
            ],
        }
    }

    match rec {
        Recommendation::NoPreferenceData { actor } => Outcome::warning(format!(
            "No preference data: {actor} has no genre history in Neo4j."
        )),
        Recommendation::NoMatch { criteria } => Outcome::Many {
            parts: vec![
                Outcome::warning(format!(
                    "No matching film: nothing in MongoDB passes the criteria for {}.",
                    criteria.excluded_actor
                )),
                criteria_record(&criteria),
            ],
        },
        Recommendation::Found { film, criteria } => Outcome::Many {
            parts: vec![
                Outcome::film(format!("Recommended for {}", criteria.excluded_actor), &film),
                criteria_record(&criteria),
            ],
        },
    }
}
