//! Integration-Tests fuer Anruf-Vermittlung und Signal-Weiterleitung
//!
//! Die Clients werden direkt ueber den Dispatcher getrieben; jede
//! Verbindung hat ihre echte Send-Queue.

use std::sync::{Arc, Barrier};

use klingel_chat::ChatService;
use klingel_core::ConnectionId;
use klingel_observability::KlingelMetrics;
use klingel_protocol::{ErrorCode, ServerMessage};
use klingel_signaling::{
    client_kanal, AnrufZustand, DispatcherContext, MessageDispatcher, SignalingConfig,
    SignalingState,
};
use tokio::sync::mpsc;

struct TestClient {
    dispatcher: MessageDispatcher,
    ctx: DispatcherContext,
    rx: mpsc::Receiver<ServerMessage>,
}

impl TestClient {
    fn neu(state: &Arc<SignalingState>) -> Self {
        let (sender, rx) = client_kanal(state.config.send_queue_groesse);
        Self {
            dispatcher: MessageDispatcher::neu(Arc::clone(state)),
            ctx: DispatcherContext::neu(sender),
            rx,
        }
    }

    fn beigetreten(state: &Arc<SignalingState>, name: &str) -> Self {
        let mut client = Self::neu(state);
        client.frame(&format!(r#"{{"type":"join","username":"{name}"}}"#));
        client.leeren();
        client
    }

    fn id(&self) -> ConnectionId {
        self.ctx.connection_id.expect("Client ist nicht beigetreten")
    }

    fn frame(&mut self, text: &str) {
        self.dispatcher.frame_verarbeiten(text, &mut self.ctx);
    }

    fn anrufen(&mut self, ziel: ConnectionId) {
        self.frame(&format!(r#"{{"type":"callUser","targetUserId":"{ziel}"}}"#));
    }

    fn annehmen(&mut self, anrufer: ConnectionId) {
        self.frame(&format!(r#"{{"type":"acceptCall","callerId":"{anrufer}"}}"#));
    }

    fn ablehnen(&mut self, anrufer: ConnectionId) {
        self.frame(&format!(r#"{{"type":"rejectCall","callerId":"{anrufer}"}}"#));
    }

    fn auflegen(&mut self) {
        self.frame(r#"{"type":"endCall"}"#);
    }

    fn trennen(&mut self) {
        self.dispatcher.client_cleanup(&mut self.ctx);
    }

    fn leeren(&mut self) -> Vec<ServerMessage> {
        let mut alle = Vec::new();
        while let Ok(n) = self.rx.try_recv() {
            alle.push(n);
        }
        alle
    }
}

fn state_mit(config: SignalingConfig) -> Arc<SignalingState> {
    SignalingState::neu(config, ChatService::neu(100), KlingelMetrics::neu().unwrap())
}

fn state() -> Arc<SignalingState> {
    state_mit(SignalingConfig::default())
}

fn fehlercode(nachrichten: &[ServerMessage]) -> Option<ErrorCode> {
    nachrichten.iter().find_map(|n| match n {
        ServerMessage::CallError(e) => Some(e.code),
        _ => None,
    })
}

fn anzahl_call_ended(nachrichten: &[ServerMessage]) -> usize {
    nachrichten
        .iter()
        .filter(|n| matches!(n, ServerMessage::CallEnded))
        .count()
}

#[test]
fn alice_ruft_bob_an_und_legt_auf() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.leeren();

    alice.anrufen(bob.id());
    let bei_bob = bob.leeren();
    assert!(matches!(
        bei_bob.as_slice(),
        [ServerMessage::IncomingCall(info)] if info.caller_id == alice.id() && info.caller_name == "Alice"
    ));
    assert!(alice.leeren().is_empty());
    assert_eq!(s.core.anruf_zustand(&alice.id()), AnrufZustand::KlingeltAlsAnrufer { angerufener: bob.id() });

    bob.annehmen(alice.id());
    let bei_alice = alice.leeren();
    assert!(bei_alice
        .iter()
        .any(|n| matches!(n, ServerMessage::CallAccepted(info) if info.accepter_id == bob.id())));
    // Roster mit beiden im Gespraech
    let roster = bei_alice
        .iter()
        .rev()
        .find_map(|n| match n {
            ServerMessage::UserList(l) => Some(l.users.clone()),
            _ => None,
        })
        .expect("Roster nach Annahme erwartet");
    assert!(roster.iter().all(|e| e.in_call));
    bob.leeren();

    // Signale laufen in beide Richtungen
    alice.frame(r#"{"type":"webrtcSignal","signal":{"type":"offer","sdp":"v=0"}}"#);
    let bei_bob = bob.leeren();
    assert!(matches!(
        bei_bob.as_slice(),
        [ServerMessage::WebrtcSignal(info)] if info.from_user_id == alice.id() && info.signal["sdp"] == "v=0"
    ));
    bob.frame(r#"{"type":"webrtcSignal","signal":{"type":"answer"}}"#);
    assert!(matches!(
        alice.leeren().as_slice(),
        [ServerMessage::WebrtcSignal(info)] if info.from_user_id == bob.id()
    ));
    assert_eq!(s.metriken.signals_relayed_total.get(), 2);

    alice.auflegen();
    let bei_bob = bob.leeren();
    assert_eq!(anzahl_call_ended(&bei_bob), 1);
    assert_eq!(anzahl_call_ended(&alice.leeren()), 0);
    assert_eq!(s.core.anruf_zustand(&alice.id()), AnrufZustand::Frei);
    assert_eq!(s.core.anruf_zustand(&bob.id()), AnrufZustand::Frei);
    assert_eq!(s.core.statistik().gespraeche, 0);
}

#[test]
fn ablehnen_meldet_dem_anrufer() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    alice.leeren();
    bob.leeren();

    bob.ablehnen(alice.id());
    assert!(matches!(
        alice.leeren().as_slice(),
        [ServerMessage::CallRejected(info)] if info.rejecter_id == bob.id()
    ));
    assert_eq!(s.core.anruf_zustand(&bob.id()), AnrufZustand::Frei);

    // Zweite Ablehnung ist folgenlos
    bob.ablehnen(alice.id());
    assert!(alice.leeren().is_empty());
    assert!(bob.leeren().is_empty());
}

#[test]
fn fehlerfaelle_beim_anrufen() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    let mut carol = TestClient::beigetreten(&s, "Carol");
    alice.leeren();
    bob.leeren();

    alice.anrufen(alice.id());
    assert_eq!(fehlercode(&alice.leeren()), Some(ErrorCode::SelfCall));

    alice.frame(r#"{"type":"callUser","targetUserId":"kein-uuid"}"#);
    assert_eq!(fehlercode(&alice.leeren()), Some(ErrorCode::InvalidTarget));

    alice.anrufen(ConnectionId::new());
    assert_eq!(fehlercode(&alice.leeren()), Some(ErrorCode::InvalidTarget));

    alice.anrufen(bob.id());
    carol.anrufen(bob.id());
    assert_eq!(fehlercode(&carol.leeren()), Some(ErrorCode::Busy));

    // Annehmen ohne Klingeln
    carol.annehmen(alice.id());
    assert_eq!(fehlercode(&carol.leeren()), Some(ErrorCode::NoSuchRing));

    // Fehler gehen nur an den Verursacher
    assert!(fehlercode(&bob.leeren()).is_none());
    assert_eq!(
        s.metriken.call_errors_total.with_label_values(&["BUSY"]).get(),
        1
    );
}

#[test]
fn gleichzeitige_gegenseitige_anrufe_nur_einer_klingelt() {
    for _ in 0..50 {
        let s = state();
        let mut alice = TestClient::beigetreten(&s, "Alice");
        let mut bob = TestClient::beigetreten(&s, "Bob");
        alice.leeren();
        let (a_id, b_id) = (alice.id(), bob.id());

        let barriere = Barrier::new(2);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                barriere.wait();
                alice.anrufen(b_id);
            });
            scope.spawn(|| {
                barriere.wait();
                bob.anrufen(a_id);
            });
        });

        let bei_alice = alice.leeren();
        let bei_bob = bob.leeren();
        let busy = [&bei_alice, &bei_bob]
            .iter()
            .filter(|n| fehlercode(n) == Some(ErrorCode::Busy))
            .count();
        let klingeln = [&bei_alice, &bei_bob]
            .iter()
            .flat_map(|n| n.iter())
            .filter(|n| matches!(n, ServerMessage::IncomingCall(_)))
            .count();
        assert_eq!(busy, 1);
        assert_eq!(klingeln, 1);
        assert_eq!(s.core.statistik().klingelnd, 1);
    }
}

#[test]
fn anrufer_trennt_waehrend_es_klingelt() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    bob.leeren();

    alice.trennen();
    let bei_bob = bob.leeren();
    assert_eq!(anzahl_call_ended(&bei_bob), 1);
    assert!(bei_bob
        .iter()
        .any(|n| matches!(n, ServerMessage::UserLeft(info) if info.username == "Alice")));
    assert_eq!(s.core.anruf_zustand(&bob.id()), AnrufZustand::Frei);

    // Bob kann danach wieder angerufen werden
    let mut carol = TestClient::beigetreten(&s, "Carol");
    carol.anrufen(bob.id());
    assert!(fehlercode(&carol.leeren()).is_none());
}

#[test]
fn partner_trennt_im_gespraech() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    bob.annehmen(alice.id());
    alice.leeren();

    bob.trennen();
    let bei_alice = alice.leeren();
    assert_eq!(anzahl_call_ended(&bei_alice), 1);
    let roster = bei_alice
        .iter()
        .find_map(|n| match n {
            ServerMessage::UserList(l) => Some(l.users.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(roster.len(), 1);
    assert!(!roster[0].in_call);

    // Mehrfaches Aufraeumen bleibt folgenlos
    bob.trennen();
    assert!(alice.leeren().is_empty());
}

#[test]
fn auflegen_ist_idempotent() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    bob.annehmen(alice.id());
    alice.leeren();
    bob.leeren();

    alice.auflegen();
    bob.auflegen();
    alice.auflegen();
    assert_eq!(anzahl_call_ended(&bob.leeren()), 1);
    assert_eq!(anzahl_call_ended(&alice.leeren()), 0);
    assert!(fehlercode(&alice.leeren()).is_none());
}

#[test]
fn signal_ohne_gespraech_wird_verworfen() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    alice.leeren();
    bob.leeren();

    // Klingeln reicht nicht fuer Weiterleitung
    alice.frame(r#"{"type":"webrtcSignal","signal":{"candidate":"x"}}"#);
    assert!(bob.leeren().is_empty());
    assert!(alice.leeren().is_empty());
    assert_eq!(s.metriken.signals_dropped_total.get(), 1);
}

#[test]
fn partnerschaft_ist_symmetrisch() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    let carol = TestClient::beigetreten(&s, "Carol");
    alice.anrufen(bob.id());
    bob.annehmen(alice.id());

    assert_eq!(s.core.partner_von(&alice.id()), Some(bob.id()));
    assert_eq!(s.core.partner_von(&bob.id()), Some(alice.id()));
    assert_eq!(s.core.partner_von(&carol.id()), None);
    assert_eq!(s.core.statistik().gespraeche, 1);
    assert_eq!(s.metriken.active_calls.get(), 1);
}

#[test]
fn vor_dem_beitritt_nur_join() {
    let s = state();
    let mut fremder = TestClient::neu(&s);

    fremder.frame(r#"{"type":"endCall"}"#);
    assert_eq!(fehlercode(&fremder.leeren()), Some(ErrorCode::NotJoined));

    fremder.frame(r#"{"type":"join","username":"Dora"}"#);
    let antworten = fremder.leeren();
    assert!(matches!(antworten.first(), Some(ServerMessage::UserId(_))));

    fremder.frame(r#"{"type":"join","username":"Dora"}"#);
    assert_eq!(fehlercode(&fremder.leeren()), Some(ErrorCode::AlreadyJoined));
}

#[test]
fn ungueltiger_frame_wird_verworfen() {
    let s = state();
    let mut alice = TestClient::beigetreten(&s, "Alice");

    alice.frame("{kein json");
    alice.frame(r#"{"type":"unbekannt"}"#);
    assert!(alice.leeren().is_empty());
    assert_eq!(s.metriken.invalid_frames_total.get(), 2);

    // Verbindung bleibt nutzbar
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    assert_eq!(bob.leeren().len(), 1);
}

#[test]
fn haengender_client_wird_abgewuergt() {
    let s = state_mit(SignalingConfig {
        send_queue_groesse: 4,
        ..Default::default()
    });
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let bob = TestClient::beigetreten(&s, "Bob");

    // Bob liest nie; Alice leert ihre Queue laufend
    for i in 0..10 {
        alice.frame(&format!(r#"{{"type":"message","text":"hallo {i}"}}"#));
        alice.leeren();
    }
    assert!(bob.ctx.sender.ist_abgewuergt());
    assert!(!alice.ctx.sender.ist_abgewuergt());
}

#[tokio::test(start_paused = true)]
async fn klingeln_endet_nach_timeout() {
    let s = state_mit(SignalingConfig {
        klingel_timeout_sek: 30,
        ..Default::default()
    });
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    alice.leeren();
    bob.leeren();

    tokio::time::sleep(std::time::Duration::from_secs(31)).await;

    assert_eq!(anzahl_call_ended(&alice.leeren()), 1);
    assert_eq!(anzahl_call_ended(&bob.leeren()), 1);
    assert_eq!(s.core.anruf_zustand(&alice.id()), AnrufZustand::Frei);
    assert_eq!(s.metriken.ringing_calls.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn angenommener_anruf_ueberlebt_timeout() {
    let s = state_mit(SignalingConfig {
        klingel_timeout_sek: 30,
        ..Default::default()
    });
    let mut alice = TestClient::beigetreten(&s, "Alice");
    let mut bob = TestClient::beigetreten(&s, "Bob");
    alice.anrufen(bob.id());
    bob.annehmen(alice.id());
    alice.leeren();
    bob.leeren();

    tokio::time::sleep(std::time::Duration::from_secs(31)).await;

    assert_eq!(anzahl_call_ended(&alice.leeren()), 0);
    assert_eq!(s.core.partner_von(&alice.id()), Some(bob.id()));
}
