//! The `/ws` bidirectional channel.
//!
//! One socket per browser. Inbound envelopes are validated by discriminator;
//! a malformed message earns an `ERROR` reply and the connection stays open.
//! Outbound traffic is funneled through a per-connection channel so batch
//! subscriptions can forward hub messages concurrently with request/reply
//! dispatch.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::AuthSession;
use crate::ingest::create_uploads;
use crate::protocol::{BatchesListData, ClientMessage, CollectionImagesData, ServerMessage};
use crate::session::UserSession;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, state, session).await;
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, session: UserSession) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);

    // Writer task: serialize and push everything the dispatchers produce.
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => {
                        dispatch(&state, &session, &out_tx, client_message).await;
                    }
                    Err(err) => {
                        // Reject the message, keep the channel.
                        let _ = out_tx
                            .send(ServerMessage::Error {
                                data: format!("Invalid message: {}", err),
                            })
                            .await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
}

pub async fn dispatch(
    state: &AppState,
    session: &UserSession,
    out_tx: &mpsc::Sender<ServerMessage>,
    message: ClientMessage,
) {
    let reply = match message {
        ClientMessage::FetchImages { data, handler } => {
            fetch_images(state, &data, &handler).await
        }
        ClientMessage::Upload { data } => {
            match create_uploads(state, session, &data.handler, &data.items).await {
                Ok(items) => Ok(vec![ServerMessage::UploadCreated { data: items }]),
                Err(err) => Err(err.client_message()),
            }
        }
        ClientMessage::SubscribeBatch { data: batchid } => {
            let mut rx = state.hub.subscribe(batchid);
            let forward_tx = out_tx.clone();
            tokio::spawn(async move {
                while let Ok(message) = rx.recv().await {
                    if forward_tx.send(message).await.is_err() {
                        break;
                    }
                }
            });
            Ok(vec![ServerMessage::Subscribed { data: batchid }])
        }
        ClientMessage::FetchBatches { data } => fetch_batches(state, data).await,
        ClientMessage::FetchBatchUploads { data: batchid } => {
            match state.uploads.get_upload_request(batchid).await {
                Ok(items) => Ok(vec![ServerMessage::BatchUploadsList { data: items }]),
                Err(err) => Err(err.client_message()),
            }
        }
    };

    match reply {
        Ok(messages) => {
            for message in messages {
                let _ = out_tx.send(message).await;
            }
        }
        Err(detail) => {
            let _ = out_tx.send(ServerMessage::Error { data: detail }).await;
        }
    }
}

async fn fetch_images(
    state: &AppState,
    input: &str,
    handler_tag: &str,
) -> Result<Vec<ServerMessage>, String> {
    let handler = state
        .registry
        .get(handler_tag)
        .map_err(|err| err.client_message())?;

    let mut images = handler
        .fetch_collection(input)
        .await
        .map_err(|err| err.to_string())?;
    if images.is_empty() {
        return Err("Collection not found".to_string());
    }

    let image_ids: Vec<String> = images.keys().cloned().collect();
    let existing = handler
        .fetch_existing_pages(&image_ids)
        .await
        .map_err(|err| err.to_string())?;
    for (image_id, pages) in existing {
        if let Some(image) = images.get_mut(&image_id) {
            image.existing = Some(pages);
        }
    }

    let creator = images
        .values()
        .next()
        .map(|image| image.creator.clone())
        .expect("non-empty collection");

    Ok(vec![ServerMessage::CollectionImages {
        data: CollectionImagesData {
            creator,
            images: images.into_values().collect(),
        },
    }])
}

async fn fetch_batches(
    state: &AppState,
    data: crate::protocol::FetchBatchesData,
) -> Result<Vec<ServerMessage>, String> {
    let page = data.page.max(1);
    let limit = data.limit.clamp(1, 500);
    let offset = (page - 1) * limit;
    let userid = data.userid.as_deref();

    let items = state
        .batches
        .get_batches(offset, limit, userid)
        .await
        .map_err(|err| err.client_message())?;
    let total = state
        .batches
        .count_batches(userid)
        .await
        .map_err(|err| err.client_message())?;

    let batch_ids: Vec<i64> = items.iter().map(|batch| batch.id).collect();
    let stats = state
        .uploads
        .get_batches_stats(&batch_ids)
        .await
        .map_err(|err| err.client_message())?;

    Ok(vec![ServerMessage::BatchesList {
        data: BatchesListData {
            items,
            total,
            stats: stats.into_iter().collect(),
        },
    }])
}
