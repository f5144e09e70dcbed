mod common;

use api_lib::web::gateway::GatewaySession;
use common::TestApp;
use serde_json::{json, Value};
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;
use vet_consult_core::domain::{Role, SessionUser};
use vet_consult_core::ports::ChatRepository;
use vet_consult_core::view::{render_transcript, ParticipantNames};

fn connect(app: &TestApp, user: &SessionUser) -> (GatewaySession, Receiver<String>) {
    let connection_id = Uuid::new_v4();
    let outbox = app.state.hub.register(connection_id);
    let session = GatewaySession::new(
        connection_id,
        user.clone(),
        app.state.hub.clone(),
        app.state.chats.clone(),
        app.state.messages.clone(),
    );
    (session, outbox)
}

fn next_frame(outbox: &mut Receiver<String>) -> Value {
    let frame = outbox.try_recv().expect("expected a queued frame");
    serde_json::from_str(&frame).unwrap()
}

fn join(chat_id: Uuid) -> String {
    json!({"event": "joinChat", "data": chat_id}).to_string()
}

fn send(chat_id: Uuid, text: &str) -> String {
    json!({"event": "sendMessage", "data": {"chatID": chat_id, "messageText": text}}).to_string()
}

#[tokio::test]
async fn relays_messages_to_the_rest_of_the_room() {
    let app = TestApp::new(None);
    let (farmer, _) = app.login(Role::Farmer, true).await;
    let (vet, _) = app.login(Role::Vet, true).await;
    app.store.add_profile(farmer.user_id, "Anna", "Berg").await;
    let chat_id = app.state.consultations.create_chat(&farmer).await.unwrap();
    app.state.consultations.assign_responder(chat_id, &vet).await.unwrap();

    let (farmer_conn, mut farmer_outbox) = connect(&app, &farmer);
    let (vet_conn, mut vet_outbox) = connect(&app, &vet);
    farmer_conn.handle_text(&join(chat_id)).await;
    vet_conn.handle_text(&join(chat_id)).await;

    farmer_conn.handle_text(&send(chat_id, "She stopped eating")).await;

    let frame = next_frame(&mut vet_outbox);
    assert_eq!(frame["event"], "receiveMessage");
    assert_eq!(frame["data"]["message"]["messageText"], "She stopped eating");
    assert_eq!(frame["data"]["message"]["sendBy"], farmer.user_id.to_string());
    assert!(frame["data"].get("chat").is_none());
    // The sender gets nothing back.
    assert!(farmer_outbox.try_recv().is_err());

    // The same text and author show up in the transcript.
    let chat = app.state.chats.get_chat(chat_id).await.unwrap();
    let names = ParticipantNames::resolve(app.store.as_ref(), &chat.participants).await;
    let transcript = render_transcript(&chat, &names).to_text();
    assert!(transcript.contains("Anna Berg: \"She stopped eating\""));

    app.state.tasks.drain().await;
}

#[tokio::test]
async fn join_failures_are_error_events() {
    let app = TestApp::new(None);
    let (farmer, _) = app.login(Role::Farmer, true).await;
    let (stranger, _) = app.login(Role::Vet, true).await;
    let chat_id = app.state.consultations.create_chat(&farmer).await.unwrap();

    let (conn, mut outbox) = connect(&app, &stranger);
    conn.handle_text(&join(Uuid::new_v4())).await;
    assert_eq!(
        next_frame(&mut outbox),
        json!({"event": "errorEvent", "data": "Chat not found"})
    );

    conn.handle_text(&join(chat_id)).await;
    assert_eq!(
        next_frame(&mut outbox),
        json!({"event": "errorEvent", "data": "User not part of the chat"})
    );
    assert!(app.state.hub.members(chat_id).is_empty());
}

#[tokio::test]
async fn sending_to_a_closed_chat_is_refused() {
    let app = TestApp::new(None);
    let (farmer, _) = app.login(Role::Farmer, true).await;
    let (vet, _) = app.login(Role::Vet, true).await;
    let chat_id = app.state.consultations.create_chat(&farmer).await.unwrap();
    app.state.consultations.assign_responder(chat_id, &vet).await.unwrap();
    app.state.consultations.close_chat(chat_id, &vet).await.unwrap();

    let (conn, mut outbox) = connect(&app, &farmer);
    conn.handle_text(&send(chat_id, "Hello?")).await;

    assert_eq!(
        next_frame(&mut outbox),
        json!({"event": "errorEvent", "data": "Chat is closed, you cannot send messages"})
    );
    let chat = app.state.chats.get_chat(chat_id).await.unwrap();
    assert!(chat.messages.iter().all(|m| m.text != "Hello?"));

    app.state.tasks.drain().await;
}

#[tokio::test]
async fn malformed_frames_do_not_end_the_session() {
    let app = TestApp::new(None);
    let (farmer, _) = app.login(Role::Farmer, true).await;
    let chat_id = app.state.consultations.create_chat(&farmer).await.unwrap();

    let (conn, mut outbox) = connect(&app, &farmer);
    conn.handle_text("not json").await;
    assert_eq!(next_frame(&mut outbox)["event"], "errorEvent");

    conn.handle_text(&join(chat_id)).await;
    assert!(outbox.try_recv().is_err());
    assert_eq!(app.state.hub.members(chat_id), vec![conn.connection_id()]);
}

#[tokio::test]
async fn system_notices_reach_every_joined_connection_with_chat_metadata() {
    let app = TestApp::new(None);
    let (farmer, _) = app.login(Role::Farmer, true).await;
    let (vet, _) = app.login(Role::Vet, true).await;
    app.store.add_profile(vet.user_id, "Lars", "Olsen").await;
    let chat_id = app.state.consultations.create_chat(&farmer).await.unwrap();

    let (conn, mut outbox) = connect(&app, &farmer);
    conn.handle_text(&join(chat_id)).await;

    app.state.consultations.assign_responder(chat_id, &vet).await.unwrap();

    let frame = next_frame(&mut outbox);
    assert_eq!(frame["event"], "receiveMessage");
    assert_eq!(frame["data"]["message"]["sendBy"], "system");
    assert_eq!(
        frame["data"]["message"]["messageText"],
        "The veterinarian Lars Olsen has been assigned to this case."
    );
    assert_eq!(frame["data"]["chat"]["chatStatus"], "ONGOING");
    assert_eq!(frame["data"]["chat"]["participants"][1]["name"], "Lars Olsen");
}

#[tokio::test]
async fn disconnects_never_drive_presence_negative() {
    let app = TestApp::new(None);
    let (farmer, _) = app.login(Role::Farmer, true).await;
    let presence = &app.state.presence;

    presence.record_connect(farmer.user_id).await;
    presence.record_disconnect(farmer.user_id).await;
    presence.record_disconnect(farmer.user_id).await;

    let state = presence.presence_of(farmer.user_id).await.unwrap();
    assert_eq!(state.online_device_count, 0);
    assert!(state.last_seen_at.is_some());
}
