//! Community detection over the actor collaboration graph.
//!
//! The partitioning itself is not done here. A [`CommunityDetector`] is
//! handed the projection to partition and returns one label per node; the
//! shipped detector asks Neo4j GDS to run Louvain.

use async_trait::async_trait;
use neo4rs::{Graph, query};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{error::AppResult, models::CommunityMember};

/// The part of the graph a detector partitions: nodes with `label`, linked
/// by undirected `rel_type` relationships.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    pub name: &'static str,
    pub label: &'static str,
    pub rel_type: &'static str,
}

pub const ACTOR_COLLABORATIONS: Projection =
    Projection { name: "actorGraph", label: "Actor", rel_type: "A_JOUE_AVEC" };

#[async_trait]
pub trait CommunityDetector: Send + Sync {
    async fn partition(
        &self,
        graph: &Graph,
        projection: &Projection,
    ) -> AppResult<Vec<CommunityMember>>;
}

/// Louvain modularity optimization through the Graph Data Science plugin.
///
/// The in-memory projection has a fixed name, so runs are serialized and the
/// projection is dropped again once the stream has been read.
#[derive(Default)]
pub struct GdsLouvain {
    running: Mutex<()>,
}

async fn drop_projection(graph: &Graph, projection: &Projection) -> AppResult<()> {
    graph
        .run(query("CALL gds.graph.drop($name, false) YIELD graphName").param("name", projection.name))
        .await?;
    Ok(())
}

fn project_statement(projection: &Projection) -> String {
    format!(
        "CALL gds.graph.project($name, $label, {{ {rel}: {{ type: '{rel}', orientation: 'UNDIRECTED' }} }}) \
         YIELD graphName",
        rel = projection.rel_type,
    )
}

async fn louvain_stream(graph: &Graph, projection: &Projection) -> AppResult<Vec<CommunityMember>> {
    graph
        .run(
            query(&project_statement(projection))
                .param("name", projection.name)
                .param("label", projection.label),
        )
        .await?;
    debug!(projection = projection.name, "projected graph");

    let mut rows = graph
        .execute(
            query(
                "CALL gds.louvain.stream($name) YIELD nodeId, communityId \
                 RETURN gds.util.asNode(nodeId).name AS actor, communityId AS community",
            )
            .param("name", projection.name),
        )
        .await?;

    let mut members = Vec::new();
    while let Some(row) = rows.next().await? {
        members.push(CommunityMember { actor: row.get("actor")?, community: row.get("community")? });
    }
    Ok(members)
}

#[async_trait]
impl CommunityDetector for GdsLouvain {
    async fn partition(
        &self,
        graph: &Graph,
        projection: &Projection,
    ) -> AppResult<Vec<CommunityMember>> {
        let _running = self.running.lock().await;

        // A projection left behind by a crashed run would make the project call fail.
        drop_projection(graph, projection).await?;
        let streamed = louvain_stream(graph, projection).await;
        let dropped = drop_projection(graph, projection).await;

        let members = streamed?;
        dropped?;
        debug!(projection = projection.name, members = members.len(), "louvain finished");
        Ok(members)
    }
}

/// Community first, then actor name.
pub fn order_members(members: &mut [CommunityMember]) {
    members.sort_by(|a, b| a.community.cmp(&b.community).then_with(|| a.actor.cmp(&b.actor)));
}
