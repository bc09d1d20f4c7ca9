use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{Document, doc},
    options::ClientOptions,
};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    config::MongoSettings,
    error::{AppError, AppResult},
    models::{
        DecadeRuntime, DecadeTop, DirectorCount, FilmDoc, GenreCriteria, GenreMatch,
        GenreRevenue, LongestFilm, YearCount,
    },
    pipelines::{self, PairSums},
    recommender::GenreMatcher,
};

/// Gateway to the film collection. The client is created on first use and
/// shared by every later query.
pub struct FilmStore {
    settings: MongoSettings,
    connect_timeout: Duration,
    client: OnceCell<Client>,
}

#[derive(Debug, Deserialize)]
struct Average {
    avg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Count {
    count: i64,
}

#[derive(Debug, Deserialize)]
struct GenreName {
    #[serde(rename = "_id")]
    name: String,
}

impl FilmStore {
    pub fn new(settings: MongoSettings, connect_timeout: Duration) -> Self {
        Self { settings, connect_timeout, client: OnceCell::new() }
    }

    async fn client(&self) -> AppResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                debug!(database = %self.settings.database, "connecting to MongoDB");
                let mut options = ClientOptions::parse(&self.settings.uri).await?;
                options.app_name = Some("cinegraph".to_string());
                options.connect_timeout = Some(self.connect_timeout);
                options.server_selection_timeout = Some(self.connect_timeout);
                Ok::<_, AppError>(Client::with_options(options)?)
            })
            .await
    }

    async fn films(&self) -> AppResult<Collection<Document>> {
        let client = self.client().await?;
        Ok(client.database(&self.settings.database).collection(&self.settings.collection))
    }

    async fn aggregate<T: DeserializeOwned>(&self, pipeline: Vec<Document>) -> AppResult<Vec<T>> {
        let docs: Vec<Document> =
            self.films().await?.aggregate(pipeline).await?.try_collect().await?;
        debug!(rows = docs.len(), "aggregation finished");
        docs.into_iter()
            .map(|d| mongodb::bson::from_document(d).map_err(Into::into))
            .collect()
    }

    async fn aggregate_one<T: DeserializeOwned>(
        &self,
        pipeline: Vec<Document>,
    ) -> AppResult<Option<T>> {
        Ok(self.aggregate(pipeline).await?.into_iter().next())
    }

    pub async fn ping(&self) -> AppResult<()> {
        let client = self.client().await?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    pub async fn most_common_year(&self) -> AppResult<Option<YearCount>> {
        self.aggregate_one(pipelines::most_common_year()).await
    }

    pub async fn count_after_year(&self, year: i64) -> AppResult<u64> {
        let count: Option<Count> = self.aggregate_one(pipelines::count_after_year(year)).await?;
        Ok(count.map_or(0, |c| c.count.max(0) as u64))
    }

    /// `None` when no film from `year` carries a vote count.
    pub async fn average_votes_in_year(&self, year: i64) -> AppResult<Option<f64>> {
        let avg: Option<Average> = self.aggregate_one(pipelines::average_votes_in_year(year)).await?;
        Ok(avg.and_then(|a| a.avg))
    }

    pub async fn films_per_year(&self) -> AppResult<Vec<YearCount>> {
        self.aggregate(pipelines::films_per_year()).await
    }

    pub async fn genres(&self) -> AppResult<Vec<String>> {
        let names: Vec<GenreName> = self.aggregate(pipelines::distinct_genres()).await?;
        Ok(names.into_iter().map(|g| g.name).collect())
    }

    pub async fn top_revenue_film(&self) -> AppResult<Option<FilmDoc>> {
        self.aggregate_one(pipelines::top_revenue_film()).await
    }

    pub async fn prolific_directors(&self, more_than: i64) -> AppResult<Vec<DirectorCount>> {
        self.aggregate(pipelines::prolific_directors(more_than)).await
    }

    pub async fn best_genre_by_revenue(&self) -> AppResult<Option<GenreRevenue>> {
        self.aggregate_one(pipelines::best_genre_by_revenue()).await
    }

    pub async fn top_rated_per_decade(&self) -> AppResult<Vec<DecadeTop>> {
        self.aggregate(pipelines::top_rated_per_decade(3)).await
    }

    pub async fn longest_film_per_genre(&self) -> AppResult<Vec<LongestFilm>> {
        self.aggregate(pipelines::longest_film_per_genre()).await
    }

    /// Materializes the high-score films and returns how many the view holds.
    pub async fn create_high_score_view(&self) -> AppResult<u64> {
        let target = &self.settings.view_collection;
        let _: Vec<Document> = self
            .films()
            .await?
            .aggregate(pipelines::high_score_view(target))
            .await?
            .try_collect()
            .await?;

        let client = self.client().await?;
        let view: Collection<Document> =
            client.database(&self.settings.database).collection(target);
        let total = view.count_documents(doc! {}).await?;
        debug!(view = %target, total, "high score view refreshed");
        Ok(total)
    }

    pub async fn runtime_revenue_correlation(&self) -> AppResult<Option<f64>> {
        let sums: Option<PairSums> =
            self.aggregate_one(pipelines::runtime_revenue_sums()).await?;
        Ok(sums.as_ref().and_then(pipelines::pearson))
    }

    pub async fn average_runtime_by_decade(&self) -> AppResult<Vec<DecadeRuntime>> {
        self.aggregate(pipelines::average_runtime_by_decade()).await
    }

    pub async fn recommend_by_genres(
        &self,
        criteria: &GenreCriteria,
    ) -> AppResult<Option<GenreMatch>> {
        if criteria.genres.is_empty() {
            return Ok(None);
        }
        let film: Option<FilmDoc> =
            self.aggregate_one(pipelines::recommend_by_genres(criteria)).await?;
        Ok(film.map(|film| GenreMatch { film, criteria: criteria.clone() }))
    }
}

#[async_trait]
impl GenreMatcher for FilmStore {
    async fn recommend_by_genres(&self, criteria: &GenreCriteria) -> AppResult<Option<GenreMatch>> {
        FilmStore::recommend_by_genres(self, criteria).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn live_store() -> FilmStore {
        let config = Config::from_env().unwrap();
        FilmStore::new(config.mongo, config.query_timeout)
    }

    #[tokio::test]
    async fn client_is_built_lazily() {
        let store = FilmStore::new(
            MongoSettings {
                uri: "mongodb://127.0.0.1:1".to_string(),
                database: "entertainment".to_string(),
                collection: "films".to_string(),
                view_collection: "high_score_films".to_string(),
            },
            Duration::from_millis(200),
        );
        assert!(store.client.get().is_none());

        let criteria = GenreCriteria {
            genres: vec![],
            excluded_actor: "Nobody".to_string(),
            min_rating: 5.0,
            min_votes: 500,
        };
        let found = store.recommend_by_genres(&criteria).await.unwrap();
        assert!(found.is_none());
        assert!(store.client.get().is_none());
    }

    #[tokio::test]
    #[ignore = "needs a seeded MongoDB"]
    async fn drama_recommendation_skips_excluded_actor() {
        let store = live_store();
        let criteria = GenreCriteria {
            genres: vec!["Drama".to_string()],
            excluded_actor: "Casey Affleck".to_string(),
            min_rating: 5.0,
            min_votes: 500,
        };
        let found = store.recommend_by_genres(&criteria).await.unwrap().unwrap();
        let cast = found.film.actors.unwrap_or_default().to_lowercase();
        assert!(!cast.contains("casey affleck"));
        assert!(found.film.genres.iter().any(|g| g == "Drama"));
        assert!(found.film.rating.unwrap() >= 5.0);
        assert!(found.film.votes.unwrap() >= 500);
        assert_eq!(found.criteria, criteria);
    }

    #[tokio::test]
    #[ignore = "needs a seeded MongoDB"]
    async fn top_revenue_film_has_revenue() {
        let store = live_store();
        let film = store.top_revenue_film().await.unwrap().unwrap();
        assert!(film.revenue.unwrap() > 0.0);
    }

    #[tokio::test]
    #[ignore = "needs a seeded MongoDB"]
    async fn count_after_year_agrees_with_the_histogram() {
        let store = live_store();
        let histogram: i64 = store
            .films_per_year()
            .await
            .unwrap()
            .iter()
            .filter(|y| y.year > 1999)
            .map(|y| y.count)
            .sum();
        assert_eq!(store.count_after_year(1999).await.unwrap(), histogram as u64);
    }

    #[tokio::test]
    #[ignore = "needs a seeded MongoDB"]
    async fn high_score_view_is_rerunnable() {
        let store = live_store();
        let first = store.create_high_score_view().await.unwrap();
        let second = store.create_high_score_view().await.unwrap();
        assert_eq!(first, second);
    }
}
