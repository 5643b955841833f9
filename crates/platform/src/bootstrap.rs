// One-shot cluster preparation: replica-set initialisation (transactions
// and change streams need one) and the static mechanic reference rows.

use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::Client;

const REPLICA_SET_ALREADY_INITIALIZED: i32 = 23;

pub async fn init_replica_set(client: &Client, host: &str) -> anyhow::Result<()> {
    let command = doc! {
        "replSetInitiate": {
            "_id": "rs0",
            "members": [{ "_id": 0, "host": host }],
        }
    };
    match client.database("admin").run_command(command, None).await {
        Ok(_) => {
            tracing::info!(host, "replica set initialised");
            Ok(())
        }
        Err(err) => match err.kind.as_ref() {
            ErrorKind::Command(command_error)
                if command_error.code == REPLICA_SET_ALREADY_INITIALIZED =>
            {
                tracing::info!("replica set already initialised");
                Ok(())
            }
            _ => Err(err.into()),
        },
    }
}

/// Upserts the three fixed mechanics so repeated bootstrap runs stay
/// idempotent.
pub async fn seed_mechanics(client: &Client, database: &str) -> anyhow::Result<()> {
    let mechanics = client
        .database(database)
        .collection::<mongodb::bson::Document>("mechanics");

    let seed = [
        ("65a000000000000000000001", "Berlin Auto Repair", 13.40, 52.52),
        ("65a000000000000000000002", "City Garage", 13.45, 52.50),
        ("65a000000000000000000003", "Fast Fix Mechanics", 13.35, 52.54),
    ];
    for (id, name, longitude, latitude) in seed {
        mechanics
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "name": name,
                    "location": { "longitude": longitude, "latitude": latitude },
                }},
                mongodb::options::UpdateOptions::builder()
                    .upsert(true)
                    .build(),
            )
            .await?;
    }
    tracing::info!(count = seed.len(), "seeded mechanics");
    Ok(())
}
