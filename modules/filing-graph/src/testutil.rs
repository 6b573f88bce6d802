//! Neo4j for integration tests: an existing server named by `NEO4J_TEST_URI`,
//! otherwise a throwaway testcontainers instance.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::GraphClient;

const IMAGE: (&str, &str) = ("neo4j", "5.25.1");
const BOLT_PORT: u16 = 7687;
const TEST_USER: &str = "neo4j";
const TEST_PASSWORD: &str = "testpassword";

/// Returns the container handle (if one was started) with a connected
/// client. Hold the handle for the whole test; dropping it stops Neo4j.
///
/// Against `NEO4J_TEST_URI` the database is wiped first, so never point it
/// at data you care about.
pub async fn neo4j_container() -> (Option<ContainerAsync<GenericImage>>, GraphClient) {
    if let Ok(uri) = std::env::var("NEO4J_TEST_URI") {
        let password =
            std::env::var("NEO4J_TEST_PASSWORD").unwrap_or_else(|_| TEST_PASSWORD.to_string());
        let client = GraphClient::connect(&uri, TEST_USER, &password)
            .await
            .expect("connect to NEO4J_TEST_URI");
        client
            .graph
            .run(neo4rs::query("MATCH (n) DETACH DELETE n"))
            .await
            .expect("wipe test database");
        return (None, client);
    }

    let container = GenericImage::new(IMAGE.0, IMAGE.1)
        .with_exposed_port(ContainerPort::Tcp(BOLT_PORT))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("{TEST_USER}/{TEST_PASSWORD}"))
        .start()
        .await
        .expect("start Neo4j container");

    let port = container
        .get_host_port_ipv4(BOLT_PORT)
        .await
        .expect("Neo4j bolt port");
    let client = GraphClient::connect(&format!("bolt://127.0.0.1:{port}"), TEST_USER, TEST_PASSWORD)
        .await
        .expect("connect to Neo4j container");

    (Some(container), client)
}
