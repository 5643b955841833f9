// Streaming RPC: snapshot of every repair, then the change-stream tail.
//
// Ordering
// - The tail subscription is opened before the snapshot read, so a repair
//   inserted in between is still delivered (possibly as a duplicate frame,
//   never silently missed).
// - A subscriber that cannot drain the buffered channel in time is dropped;
//   the drop is terminal.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::core::ports::RepairTail;
use crate::core::repair::{Location, MechanicInfo, Repair, RepairCost};

pub mod pb {
    tonic::include_proto!("repair.v1");
}

use pb::repair_stream_server::{RepairStream, RepairStreamServer};

const SUBSCRIBER_BUFFER: usize = 64;

pub struct RepairStreamService {
    tail: Arc<dyn RepairTail>,
}

impl RepairStreamService {
    pub fn new(tail: Arc<dyn RepairTail>) -> Self {
        Self { tail }
    }
}

pub fn server(tail: Arc<dyn RepairTail>) -> RepairStreamServer<RepairStreamService> {
    RepairStreamServer::new(RepairStreamService::new(tail))
}

#[tonic::async_trait]
impl RepairStream for RepairStreamService {
    type StreamAllRepairsStream = ReceiverStream<Result<pb::Repair, Status>>;

    async fn stream_all_repairs(
        &self,
        _request: Request<pb::Empty>,
    ) -> Result<Response<Self::StreamAllRepairsStream>, Status> {
        let mut inserts = self
            .tail
            .subscribe()
            .await
            .map_err(|err| Status::internal(err.to_string()))?;
        let snapshot = self
            .tail
            .snapshot()
            .await
            .map_err(|err| Status::internal(err.to_string()))?;

        let (frames, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        tokio::spawn(async move {
            let count = snapshot.len();
            for repair in snapshot {
                if frames.send(Ok(to_proto(&repair))).await.is_err() {
                    return;
                }
            }
            tracing::info!(count, "sent repair snapshot");

            while let Some(next) = inserts.next().await {
                match next {
                    Ok(repair) => match frames.try_send(Ok(to_proto(&repair))) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::warn!("dropping slow stream subscriber");
                            return;
                        }
                        Err(TrySendError::Closed(_)) => return,
                    },
                    Err(err) => {
                        let _ = frames.send(Err(Status::internal(err.to_string()))).await;
                        return;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(receiver)))
    }
}

fn to_proto(repair: &Repair) -> pb::Repair {
    pb::Repair {
        id: repair.id.clone(),
        user_id: repair.user_id.clone(),
        status: repair.status.to_string(),
        repair_cost: Some(cost_to_proto(&repair.repair_cost)),
    }
}

fn cost_to_proto(cost: &RepairCost) -> pb::RepairCost {
    pb::RepairCost {
        id: cost.id.clone(),
        user_id: cost.user_id.clone(),
        repair_type: cost.repair_type.to_string(),
        total_price: cost.total_price,
        user_location: cost.user_location.map(location_to_proto),
        mechanics: cost.mechanics.iter().map(mechanic_to_proto).collect(),
    }
}

fn location_to_proto(location: Location) -> pb::Location {
    pb::Location {
        longitude: location.longitude,
        latitude: location.latitude,
    }
}

fn mechanic_to_proto(mechanic: &MechanicInfo) -> pb::MechanicInfo {
    pb::MechanicInfo {
        id: mechanic.id.clone(),
        name: mechanic.name.clone(),
        location: Some(location_to_proto(mechanic.location)),
        distance: mechanic.distance,
    }
}
