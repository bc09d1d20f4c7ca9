use async_trait::async_trait;
use neo4rs::{Graph, Query, Row, query};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    communities::{self, ACTOR_COLLABORATIONS, CommunityDetector},
    config::Neo4jSettings,
    error::AppResult,
    models::{
        ActorRevenue, Collaboration, CommunityMember, EdgeSummary, GenrePair, GraphSuggestion,
        NameCount,
    },
    recommender::GenrePreferences,
};

pub const FILM_LIST_LIMIT: i64 = 50;

/// Gateway to the actor/director/film/genre graph. The connection pool is
/// opened on first use; a failed attempt is retried on the next call.
pub struct GraphStore {
    settings: Neo4jSettings,
    graph: OnceCell<Graph>,
    communities: Box<dyn CommunityDetector>,
}

impl GraphStore {
    pub fn new(settings: Neo4jSettings, communities: Box<dyn CommunityDetector>) -> Self {
        Self { settings, graph: OnceCell::new(), communities }
    }

    async fn graph(&self) -> AppResult<&Graph> {
        self.graph
            .get_or_try_init(|| async {
                debug!(uri = %self.settings.uri, "connecting to Neo4j");
                Graph::new(&self.settings.uri, &self.settings.user, &self.settings.password).await
            })
            .await
            .map_err(Into::into)
    }

    async fn rows(&self, q: Query) -> AppResult<Vec<Row>> {
        let mut result = self.graph().await?.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        debug!(rows = rows.len(), "cypher query finished");
        Ok(rows)
    }

    async fn first(&self, q: Query) -> AppResult<Option<Row>> {
        Ok(self.rows(q).await?.into_iter().next())
    }

    /// One string column; rows where it is null are skipped.
    async fn strings(&self, q: Query, column: &str) -> AppResult<Vec<String>> {
        let mut out = Vec::new();
        for row in self.rows(q).await? {
            if let Some(value) = row.get::<Option<String>>(column)? {
                out.push(value);
            }
        }
        Ok(out)
    }

    async fn name_count(&self, q: Query) -> AppResult<Option<NameCount>> {
        self.first(q).await?.map(|r| to_name_count(&r)).transpose()
    }

    /// Runs a MERGE statement and reports how many `rel_type` relationships
    /// exist afterwards.
    async fn merge_edges(&self, rel_type: &'static str, cypher: &str) -> AppResult<EdgeSummary> {
        let graph = self.graph().await?;
        graph.run(query(cypher)).await?;
        let total = self.count_relationships(rel_type).await?;
        debug!(rel_type, total, "merged derived relationships");
        Ok(EdgeSummary { rel_type, total })
    }

    pub async fn count_relationships(&self, rel_type: &str) -> AppResult<i64> {
        let cypher = format!("MATCH ()-[r:{rel_type}]->() RETURN count(r) AS total");
        match self.first(query(&cypher)).await? {
            Some(row) => Ok(row.get("total")?),
            None => Ok(0),
        }
    }

    pub async fn ping(&self) -> AppResult<String> {
        let row = self.first(query("RETURN 'Connected to Neo4j' AS message")).await?;
        match row {
            Some(row) => Ok(row.get("message")?),
            None => Ok(String::new()),
        }
    }

    pub async fn list_films(&self) -> AppResult<Vec<String>> {
        let q = query("MATCH (f:Film) RETURN f.title AS title ORDER BY f.title LIMIT $limit")
            .param("limit", FILM_LIST_LIMIT);
        self.strings(q, "title").await
    }

    pub async fn list_directors(&self) -> AppResult<Vec<String>> {
        self.strings(query("MATCH (d:Director) RETURN d.name AS name ORDER BY d.name"), "name").await
    }

    pub async fn list_actors(&self) -> AppResult<Vec<String>> {
        self.strings(query("MATCH (a:Actor) RETURN a.name AS name ORDER BY name"), "name").await
    }

    pub async fn films_by_director(&self, director: &str) -> AppResult<Vec<String>> {
        let q = query(
            "MATCH (d:Director {name: $name})-[:REALISE]->(f:Film) \
             RETURN f.title AS title ORDER BY f.year",
        )
        .param("name", director);
        self.strings(q, "title").await
    }

    pub async fn most_active_actor(&self) -> AppResult<Option<NameCount>> {
        self.name_count(query(
            "MATCH (a:Actor)-[:A_JOUE]->(f:Film) \
             RETURN a.name AS name, count(f) AS count ORDER BY count DESC LIMIT 1",
        ))
        .await
    }

    /// Empty when the actor is unknown.
    pub async fn co_actors(&self, actor: &str) -> AppResult<Vec<String>> {
        let q = query(
            "MATCH (a1:Actor {name: $name})-[:A_JOUE]->(:Film)<-[:A_JOUE]-(a2:Actor) \
             WHERE a1 <> a2 \
             RETURN DISTINCT a2.name AS co_actor ORDER BY co_actor",
        )
        .param("name", actor);
        self.strings(q, "co_actor").await
    }

    pub async fn top_grossing_actor(&self) -> AppResult<Option<ActorRevenue>> {
        let row = self
            .first(query(
                "MATCH (a:Actor)-[:A_JOUE]->(f:Film) WHERE toFloat(f.revenue) IS NOT NULL \
                 RETURN a.name AS actor, sum(toFloat(f.revenue)) AS total_revenue \
                 ORDER BY total_revenue DESC LIMIT 1",
            ))
            .await?;
        row.map(|r| Ok(ActorRevenue { actor: r.get("actor")?, total_revenue: r.get("total_revenue")? }))
            .transpose()
    }

    pub async fn average_votes(&self) -> AppResult<Option<f64>> {
        let row = self
            .first(query(
                "MATCH (f:Film) WHERE toFloat(f.votes) IS NOT NULL \
                 RETURN avg(toFloat(f.votes)) AS avg_votes",
            ))
            .await?;
        Ok(match row {
            Some(row) => row.get::<Option<f64>>("avg_votes")?,
            None => None,
        })
    }

    pub async fn most_common_genre(&self) -> AppResult<Option<NameCount>> {
        self.name_count(query(
            "MATCH (f:Film)-[:APPARTIENT_A]->(g:Genre) \
             RETURN g.name AS name, count(f) AS count ORDER BY count DESC LIMIT 1",
        ))
        .await
    }

    /// Films of the actor's co-actors. The actor's own films are not
    /// filtered out and usually appear in the result.
    pub async fn co_actor_films(&self, actor: &str) -> AppResult<Vec<String>> {
        let q = query(
            "MATCH (me:Actor {name: $name})-[:A_JOUE]->(:Film)<-[:A_JOUE]-(co:Actor) \
             WHERE me <> co \
             MATCH (co)-[:A_JOUE]->(f2:Film) \
             RETURN DISTINCT f2.title AS film ORDER BY film",
        )
        .param("name", actor);
        self.strings(q, "film").await
    }

    pub async fn director_with_most_actors(&self) -> AppResult<Option<NameCount>> {
        self.name_count(query(
            "MATCH (d:Director)-[:REALISE]->(:Film)<-[:A_JOUE]-(a:Actor) \
             RETURN d.name AS name, count(DISTINCT a) AS count ORDER BY count DESC LIMIT 1",
        ))
        .await
    }

    pub async fn most_connected_films(&self, limit: i64) -> AppResult<Vec<NameCount>> {
        let q = query(
            "MATCH (a:Actor)-[:A_JOUE]->(f:Film) \
             RETURN f.title AS name, count(a) AS count ORDER BY count DESC LIMIT $limit",
        )
        .param("limit", limit);
        self.rows(q).await?.iter().map(to_name_count).collect()
    }

    pub async fn actors_with_most_directors(&self, limit: i64) -> AppResult<Vec<NameCount>> {
        let q = query(
            "MATCH (a:Actor)-[:A_JOUE]->(:Film)<-[:REALISE]-(d:Director) \
             RETURN a.name AS name, count(DISTINCT d) AS count ORDER BY count DESC LIMIT $limit",
        )
        .param("limit", limit);
        self.rows(q).await?.iter().map(to_name_count).collect()
    }

    /// One film in the actor's most played genre that the actor is not in.
    pub async fn recommend_by_genre(&self, actor: &str) -> AppResult<Option<GraphSuggestion>> {
        let q = query(
            "MATCH (a:Actor {name: $name})-[:A_JOUE]->(:Film)-[:APPARTIENT_A]->(g:Genre) \
             WITH a, g, count(*) AS freq ORDER BY freq DESC LIMIT 1 \
             MATCH (rec:Film)-[:APPARTIENT_A]->(g) \
             WHERE NOT (a)-[:A_JOUE]->(rec) \
             RETURN rec.title AS title, g.name AS genre LIMIT 1",
        )
        .param("name", actor);
        self.first(q)
            .await?
            .map(|r| Ok(GraphSuggestion { title: r.get("title")?, genre: r.get("genre")? }))
            .transpose()
    }

    pub async fn create_influence_edges(&self) -> AppResult<EdgeSummary> {
        self.merge_edges(
            "INFLUENCE_PAR",
            "MATCH (d1:Director)-[:REALISE]->(:Film)-[:APPARTIENT_A]->(g:Genre)\
             <-[:APPARTIENT_A]-(:Film)<-[:REALISE]-(d2:Director) \
             WHERE d1 <> d2 \
             MERGE (d1)-[:INFLUENCE_PAR]->(d2)",
        )
        .await
    }

    /// Names along the shortest `A_JOUE` path, actors and films alternating.
    /// `None` when either actor is missing or they are not connected.
    pub async fn shortest_path(&self, from: &str, to: &str) -> AppResult<Option<Vec<String>>> {
        if from == to {
            let q = query("MATCH (a:Actor {name: $name}) RETURN a.name AS name LIMIT 1")
                .param("name", from);
            return Ok(self.first(q).await?.map(|_| vec![from.to_string()]));
        }

        let q = query(
            "MATCH (a1:Actor {name: $from}), (a2:Actor {name: $to}) \
             MATCH path = shortestPath((a1)-[:A_JOUE*]-(a2)) \
             RETURN [n IN nodes(path) | coalesce(n.name, n.title)] AS names",
        )
        .param("from", from)
        .param("to", to);
        match self.first(q).await? {
            Some(row) => Ok(Some(row.get("names")?)),
            None => Ok(None),
        }
    }

    pub async fn create_collaboration_edges(&self) -> AppResult<EdgeSummary> {
        self.merge_edges(
            "A_JOUE_AVEC",
            "MATCH (a1:Actor)-[:A_JOUE]->(:Film)<-[:A_JOUE]-(a2:Actor) \
             WHERE a1 <> a2 \
             MERGE (a1)-[:A_JOUE_AVEC]-(a2)",
        )
        .await
    }

    pub async fn actor_communities(&self) -> AppResult<Vec<CommunityMember>> {
        let graph = self.graph().await?;
        let mut members = self.communities.partition(graph, &ACTOR_COLLABORATIONS).await?;
        communities::order_members(&mut members);
        Ok(members)
    }

    pub async fn common_genre_pairs(&self, limit: i64) -> AppResult<Vec<GenrePair>> {
        let q = query(
            "MATCH (f1:Film)-[:APPARTIENT_A]->(g:Genre)<-[:APPARTIENT_A]-(f2:Film), \
                   (f1)<-[:REALISE]-(d1:Director), \
                   (f2)<-[:REALISE]-(d2:Director) \
             WHERE f1 <> f2 AND d1 <> d2 \
             RETURN DISTINCT f1.title AS film1, d1.name AS director1, \
                             f2.title AS film2, d2.name AS director2, g.name AS genre \
             LIMIT $limit",
        )
        .param("limit", limit);
        self.rows(q)
            .await?
            .iter()
            .map(|r| {
                Ok(GenrePair {
                    film1: r.get("film1")?,
                    director1: r.get("director1")?,
                    film2: r.get("film2")?,
                    director2: r.get("director2")?,
                    genre: r.get("genre")?,
                })
            })
            .collect()
    }

    pub async fn preferred_genres(&self, actor: &str, limit: i64) -> AppResult<Vec<String>> {
        let q = query(
            "MATCH (a:Actor {name: $name})-[:A_JOUE]->(:Film)-[:APPARTIENT_A]->(g:Genre) \
             RETURN g.name AS genre, count(*) AS freq ORDER BY freq DESC LIMIT $limit",
        )
        .param("name", actor)
        .param("limit", limit);
        self.strings(q, "genre").await
    }

    pub async fn create_concurrence_edges(&self) -> AppResult<EdgeSummary> {
        self.merge_edges(
            "CONCURRENCE",
            "MATCH (d1:Director)-[:REALISE]->(f1:Film)-[:APPARTIENT_A]->(g:Genre)\
             <-[:APPARTIENT_A]-(f2:Film)<-[:REALISE]-(d2:Director) \
             WHERE d1 <> d2 AND f1.year = f2.year \
             MERGE (d1)-[:CONCURRENCE]->(d2)",
        )
        .await
    }

    pub async fn frequent_collaborations(&self, min_collaborations: i64) -> AppResult<Vec<Collaboration>> {
        let q = query(
            "MATCH (a:Actor)-[:A_JOUE]->(f:Film)<-[:REALISE]-(d:Director) \
             WITH a, d, count(f) AS collaborations, \
                  avg(toFloat(f.revenue)) AS avg_revenue, \
                  avg(toFloat(f.votes)) AS avg_votes \
             WHERE collaborations >= $min \
             RETURN a.name AS actor, d.name AS director, collaborations, avg_revenue, avg_votes \
             ORDER BY collaborations DESC",
        )
        .param("min", min_collaborations);
        self.rows(q)
            .await?
            .iter()
            .map(|r| {
                Ok(Collaboration {
                    actor: r.get("actor")?,
                    director: r.get("director")?,
                    collaborations: r.get("collaborations")?,
                    avg_revenue: r.get("avg_revenue")?,
                    avg_votes: r.get("avg_votes")?,
                })
            })
            .collect()
    }
}

fn to_name_count(row: &Row) -> AppResult<NameCount> {
    Ok(NameCount { name: row.get("name")?, count: row.get("count")? })
}

#[async_trait]
impl GenrePreferences for GraphStore {
    async fn preferred_genres(&self, actor: &str, limit: i64) -> AppResult<Vec<String>> {
        GraphStore::preferred_genres(self, actor, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{communities::GdsLouvain, config::Config};

    fn live_store() -> GraphStore {
        let config = Config::from_env().unwrap();
        GraphStore::new(config.neo4j, Box::new(GdsLouvain::default()))
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j"]
    async fn co_actors_are_sorted_distinct_and_exclude_the_actor() {
        let store = live_store();
        let co_actors = store.co_actors("Anne Hathaway").await.unwrap();

        assert!(!co_actors.is_empty());
        assert!(!co_actors.iter().any(|a| a == "Anne Hathaway"));
        assert!(co_actors.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j"]
    async fn unknown_actor_has_no_preferred_genres() {
        let store = live_store();
        let genres = store.preferred_genres("No Such Actor 1234", 3).await.unwrap();
        assert!(genres.is_empty());
        assert!(store.co_actors("No Such Actor 1234").await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j"]
    async fn missing_actor_has_no_path() {
        let store = live_store();
        let path = store.shortest_path("Anne Hathaway", "No Such Actor 1234").await.unwrap();
        assert_eq!(path, None);
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j"]
    async fn isolated_actors_have_no_path() {
        let store = live_store();
        let graph = store.graph().await.unwrap();
        graph
            .run(query("MERGE (:Actor {name: 'Isolated Actor A'}) MERGE (:Actor {name: 'Isolated Actor B'})"))
            .await
            .unwrap();

        let path = store.shortest_path("Isolated Actor A", "Isolated Actor B").await;

        graph
            .run(query(
                "MATCH (a:Actor) WHERE a.name IN ['Isolated Actor A', 'Isolated Actor B'] DETACH DELETE a",
            ))
            .await
            .unwrap();
        assert_eq!(path.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j"]
    async fn path_to_the_same_actor_is_a_single_node() {
        let store = live_store();
        let path = store.shortest_path("Anne Hathaway", "Anne Hathaway").await.unwrap();
        assert_eq!(path, Some(vec!["Anne Hathaway".to_string()]));

        let missing = store.shortest_path("No Such Actor 1234", "No Such Actor 1234").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j with GDS"]
    async fn overlapping_community_runs_both_succeed_and_clean_up() {
        let store = live_store();
        store.create_collaboration_edges().await.unwrap();

        let (first, second) = tokio::join!(store.actor_communities(), store.actor_communities());
        assert_eq!(first.unwrap().len(), second.unwrap().len());

        let exists = store
            .first(
                query("CALL gds.graph.exists($name) YIELD exists RETURN exists")
                    .param("name", ACTOR_COLLABORATIONS.name),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!exists.get::<bool>("exists").unwrap());
    }

    #[tokio::test]
    #[ignore = "needs a seeded Neo4j"]
    async fn edge_creation_is_idempotent() {
        let store = live_store();

        let once = store.create_collaboration_edges().await.unwrap();
        let twice = store.create_collaboration_edges().await.unwrap();
        assert_eq!(once, twice);

        let once = store.create_influence_edges().await.unwrap();
        let twice = store.create_influence_edges().await.unwrap();
        assert_eq!(once, twice);

        let once = store.create_concurrence_edges().await.unwrap();
        let twice = store.create_concurrence_edges().await.unwrap();
        assert_eq!(once, twice);
    }
}
