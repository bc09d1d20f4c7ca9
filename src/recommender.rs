//! Cross-store recommendation: preferred genres come from the graph, the
//! film itself from the document collection.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::AppResult,
    models::{FilmDoc, GenreCriteria, GenreMatch},
};

pub const PREFERRED_GENRE_COUNT: i64 = 3;
pub const MIN_RATING: f64 = 5.0;
pub const MIN_VOTES: i64 = 500;

#[async_trait]
pub trait GenrePreferences: Send + Sync {
    /// Genres the actor played most, most frequent first. Unknown actors
    /// yield an empty list.
    async fn preferred_genres(&self, actor: &str, limit: i64) -> AppResult<Vec<String>>;
}

#[async_trait]
pub trait GenreMatcher: Send + Sync {
    async fn recommend_by_genres(&self, criteria: &GenreCriteria) -> AppResult<Option<GenreMatch>>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    /// The graph has no genre history for the actor.
    NoPreferenceData { actor: String },
    /// Genres were found but no film passed the filter.
    NoMatch { criteria: GenreCriteria },
    Found { film: FilmDoc, criteria: GenreCriteria },
}

pub async fn recommend<P, M>(prefs: &P, matcher: &M, actor: &str) -> AppResult<Recommendation>
where
    P: GenrePreferences + ?Sized,
    M: GenreMatcher + ?Sized,
{
    let actor = actor.trim();
    let genres = prefs.preferred_genres(actor, PREFERRED_GENRE_COUNT).await?;
    if genres.is_empty() {
        debug!(actor, "no genre history");
        return Ok(Recommendation::NoPreferenceData { actor: actor.to_string() });
    }

    let criteria = GenreCriteria {
        genres,
        excluded_actor: actor.to_string(),
        min_rating: MIN_RATING,
        min_votes: MIN_VOTES,
    };
    debug!(actor, genres = ?criteria.genres, "looking for a film");

    Ok(match matcher.recommend_by_genres(&criteria).await? {
        Some(found) => Recommendation::Found { film: found.film, criteria: found.criteria },
        None => Recommendation::NoMatch { criteria },
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct FakeGraph(HashMap<&'static str, Vec<&'static str>>);

    #[async_trait]
    impl GenrePreferences for FakeGraph {
        async fn preferred_genres(&self, actor: &str, limit: i64) -> AppResult<Vec<String>> {
            Ok(self
                .0
                .get(actor)
                .map(|g| g.iter().take(limit as usize).map(|s| s.to_string()).collect())
                .unwrap_or_default())
        }
    }

    /// Applies the same filter the aggregation pipeline does, over a fixed list.
    struct FakeCollection {
        films: Vec<FilmDoc>,
        calls: AtomicUsize,
    }

    impl FakeCollection {
        fn new(films: Vec<FilmDoc>) -> Self {
            Self { films, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl GenreMatcher for FakeCollection {
        async fn recommend_by_genres(
            &self,
            criteria: &GenreCriteria,
        ) -> AppResult<Option<GenreMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let excluded = criteria.excluded_actor.to_lowercase();
            let film = self.films.iter().find(|f| {
                f.genres.iter().any(|g| criteria.genres.contains(g))
                    && !f.actors.as_deref().unwrap_or("").to_lowercase().contains(&excluded)
                    && f.rating.is_some_and(|r| r >= criteria.min_rating)
                    && f.votes.is_some_and(|v| v >= criteria.min_votes)
            });
            Ok(film.map(|f| GenreMatch { film: f.clone(), criteria: criteria.clone() }))
        }
    }

    fn film(title: &str, genres: &[&str], actors: &str, rating: f64, votes: i64) -> FilmDoc {
        FilmDoc {
            title: Some(title.to_string()),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            actors: Some(actors.to_string()),
            rating: Some(rating),
            votes: Some(votes),
            ..Default::default()
        }
    }

    fn graph() -> FakeGraph {
        FakeGraph(HashMap::from([
            ("Casey Affleck", vec!["Drama", "Crime", "Thriller", "Mystery"]),
            ("Ryan Gosling", vec!["Musical"]),
        ]))
    }

    #[tokio::test]
    async fn unknown_actor_has_no_preference_data() {
        let films = FakeCollection::new(vec![film("Arrival", &["Drama"], "Amy Adams", 7.9, 400_000)]);

        let rec = recommend(&graph(), &films, "Nobody Known").await.unwrap();

        assert_eq!(rec, Recommendation::NoPreferenceData { actor: "Nobody Known".to_string() });
        assert_eq!(films.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_match_keeps_the_criteria() {
        let films = FakeCollection::new(vec![
            film("La La Land", &["Comedy", "Drama", "Music"], "Ryan Gosling, Emma Stone", 8.3, 258_682),
            film("Tiny Musical", &["Musical"], "Someone Else", 6.0, 120),
        ]);

        let rec = recommend(&graph(), &films, "Ryan Gosling").await.unwrap();

        let Recommendation::NoMatch { criteria } = rec else {
            panic!("expected no match, got {rec:?}");
        };
        assert_eq!(criteria.genres, vec!["Musical".to_string()]);
        assert_eq!(criteria.excluded_actor, "Ryan Gosling");
        assert_eq!(criteria.min_rating, MIN_RATING);
        assert_eq!(criteria.min_votes, MIN_VOTES);
    }

    #[tokio::test]
    async fn found_film_excludes_the_actor_and_shares_a_genre() {
        let films = FakeCollection::new(vec![
            film("Manchester by the Sea", &["Drama"], "casey affleck, Michelle Williams", 7.9, 134_213),
            film("Low Votes", &["Crime"], "Someone", 9.0, 12),
            film("Moonlight", &["Drama"], "Mahershala Ali, Naomie Harris", 7.5, 135_095),
        ]);

        let rec = recommend(&graph(), &films, " Casey Affleck ").await.unwrap();

        let Recommendation::Found { film, criteria } = rec else {
            panic!("expected a film, got {rec:?}");
        };
        assert_eq!(film.title.as_deref(), Some("Moonlight"));
        assert!(!film.actors.unwrap().to_lowercase().contains("casey affleck"));
        assert_eq!(criteria.genres, vec!["Drama", "Crime", "Thriller"]);
        assert_eq!(criteria.excluded_actor, "Casey Affleck");
    }

    #[tokio::test]
    async fn repeated_calls_give_the_same_answer() {
        let films = FakeCollection::new(vec![film("Moonlight", &["Drama"], "Mahershala Ali", 7.5, 135_095)]);
        let g = graph();

        let first = recommend(&g, &films, "Casey Affleck").await.unwrap();
        let second = recommend(&g, &films, "Casey Affleck").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(films.calls.load(Ordering::SeqCst), 2);
    }
}
