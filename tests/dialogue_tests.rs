mod common;

use common::{chat, email_action, orchestrator, RecordingDispatcher, ScriptedModel};
use parley::kernel::event::Utterance;
use parley::kernel::orchestrator::{CLARIFY_REPLY, MISSED_REPLY, MODEL_FAILURE_REPLY};
use parley::kernel::task::{Fingerprint, TaskKind, TaskStep};
use parley::ConversationState;
use serde_json::json;

async fn say(
    orchestrator: &parley::TurnOrchestrator,
    state: &mut ConversationState,
    text: &str,
) -> String {
    orchestrator.handle_turn(state, &Utterance::text(text)).await
}

#[tokio::test]
async fn test_fuzzy_recipient_full_flow() {
    let model = ScriptedModel::new([email_action("Sure, who should get it?", json!({ "to": "Marta" }))]);
    let dispatcher = RecordingDispatcher::new();
    let bot = orchestrator(model.clone(), dispatcher.clone());
    let mut state = ConversationState::default();

    // 1. Fuzzy name match asks for confirmation
    let reply = say(&bot, &mut state, "send an email to marta").await;
    assert_eq!(reply, "Did you mean marta@x.com?");
    let pending = state.pending().expect("task should be pending");
    assert_eq!(pending.step, TaskStep::AwaitingRecipientConfirm);
    assert_eq!(pending.recipient(), Some("marta@x.com"));

    // 2. Affirmative keeps the recipient and asks for the body (no model call)
    let reply = say(&bot, &mut state, "yes").await;
    assert_eq!(reply, "What message should I send to marta@x.com?");
    let pending = state.pending().unwrap();
    assert_eq!(pending.step, TaskStep::AwaitingBody);
    assert_eq!(pending.recipient(), Some("marta@x.com"));
    assert_eq!(model.calls(), 1);

    // 3. Filler re-asks
    let reply = say(&bot, &mut state, "okay").await;
    assert_eq!(reply, "Please tell me the message you want to send.");
    assert_eq!(state.pending().unwrap().step, TaskStep::AwaitingBody);

    // 4. Substantive utterance becomes the body and is sent
    let reply = say(&bot, &mut state, "tell her I'm running late").await;
    assert_eq!(reply, "I've sent your message to marta@x.com.");
    assert!(state.pending().is_none());
    assert!(state.is_completed(&Fingerprint::new(TaskKind::SendEmail, "marta@x.com")));

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "marta@x.com");
    assert_eq!(sent[0].body, "tell her I'm running late");
    assert_eq!(sent[0].subject, "Voice assistant message");

    // The task-opening turn is hidden from later context.
    assert!(state.context().is_empty());
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_filler_does_not_send_proposed_body() {
    let model = ScriptedModel::new([email_action("", json!({ "to": "marta", "body": "hello" }))]);
    let dispatcher = RecordingDispatcher::new();
    let bot = orchestrator(model, dispatcher.clone());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "email marta and say hello").await;
    assert_eq!(reply, "Did you mean marta@x.com?");
    let reply = say(&bot, &mut state, "yes").await;
    assert_eq!(reply, "What message should I send to marta@x.com?");

    let reply = say(&bot, &mut state, "okay").await;
    assert_eq!(reply, "Please tell me the message you want to send.");
    let pending = state.pending().expect("task still pending");
    assert_eq!(pending.step, TaskStep::AwaitingBody);
    assert_eq!(pending.body(), Some("hello"));
    assert!(!pending.retry);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_filler_rejects_fuzzy_recipient() {
    for filler in ["okay", "look"] {
        let model = ScriptedModel::new([email_action("", json!({ "to": "marta" }))]);
        let dispatcher = RecordingDispatcher::new();
        let bot = orchestrator(model.clone(), dispatcher.clone());
        let mut state = ConversationState::default();

        say(&bot, &mut state, "email marta").await;
        assert_eq!(state.pending().unwrap().step, TaskStep::AwaitingRecipientConfirm);

        let reply = say(&bot, &mut state, filler).await;
        assert_eq!(reply, "Okay, please tell me the correct e-mail address.", "{}", filler);
        assert!(state.pending().is_none(), "{}", filler);
        assert!(dispatcher.sent().is_empty());
        assert_eq!(model.calls(), 1);
    }
}

#[tokio::test]
async fn test_never_mind_cancels_body_capture() {
    let model = ScriptedModel::new([email_action("", json!({ "to": "marta" }))]);
    let dispatcher = RecordingDispatcher::new();
    let bot = orchestrator(model, dispatcher.clone());
    let mut state = ConversationState::default();

    say(&bot, &mut state, "email marta").await;
    say(&bot, &mut state, "yes").await;
    assert_eq!(state.pending().unwrap().step, TaskStep::AwaitingBody);

    let reply = say(&bot, &mut state, "never mind").await;
    assert_eq!(reply, "Okay, I've cancelled the e-mail.");
    assert!(state.pending().is_none());
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_rejected_recipient_asks_for_address() {
    let model = ScriptedModel::new([email_action("", json!({ "to": "marta" }))]);
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    say(&bot, &mut state, "email marta").await;
    let reply = say(&bot, &mut state, "no").await;
    assert_eq!(reply, "Okay, please tell me the correct e-mail address.");
    assert!(state.pending().is_none());
}

#[tokio::test]
async fn test_unclassified_reply_goes_to_model_without_last_turn() {
    let model = ScriptedModel::new([
        email_action("Okay.", json!({ "to": "marta" })),
        chat("Paris is lovely in spring."),
    ]);
    let bot = orchestrator(model.clone(), RecordingDispatcher::new());
    let mut state = ConversationState::default();

    say(&bot, &mut state, "email marta").await;
    let reply = say(&bot, &mut state, "what is paris like").await;
    assert_eq!(reply, "Paris is lovely in spring.");
    assert!(state.pending().is_none());

    // The pending task's turn was left out of the second prompt.
    let prompt = model.last_prompt().unwrap();
    assert!(!prompt.contains("Conversation so far"));
    assert!(prompt.ends_with("User: what is paris like\nAssistant:"));
}

#[tokio::test]
async fn test_merge_keeps_earlier_slots() {
    let model = ScriptedModel::new([
        email_action("Who should I send it to?", json!({ "body": "lunch at noon" })),
        email_action("Sending now.", json!({ "to": "John Smith" })),
    ]);
    let dispatcher = RecordingDispatcher::new();
    let bot = orchestrator(model, dispatcher.clone());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "send an email saying lunch at noon").await;
    assert_eq!(reply, "Who would you like to send the e-mail to?");
    let pending = state.pending().unwrap();
    assert_eq!(pending.step, TaskStep::None);
    assert_eq!(pending.body(), Some("lunch at noon"));

    // Exact contact, body already known: sent straight away.
    let reply = say(&bot, &mut state, "john smith").await;
    assert_eq!(reply, "I've sent your message to john@example.com.");
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "john@example.com");
    assert_eq!(sent[0].body, "lunch at noon");
    assert_eq!(state.context().len(), 2);
}

#[tokio::test]
async fn test_completed_task_downgrades_to_chat() {
    let model = ScriptedModel::new([
        email_action("", json!({ "to": "john smith", "body": "hello" })),
        email_action("I already sent that one.", json!({ "to": "john@example.com", "body": "hello" })),
    ]);
    let dispatcher = RecordingDispatcher::new();
    let bot = orchestrator(model, dispatcher.clone());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "email john smith saying hello").await;
    assert_eq!(reply, "I've sent your message to john@example.com.");

    let reply = say(&bot, &mut state, "did you send it to john").await;
    assert_eq!(reply, "I already sent that one.");
    assert_eq!(dispatcher.sent().len(), 1);
    assert!(state.pending().is_none());
    assert_eq!(state.context().last().unwrap().intent, "general_chat");
}

#[tokio::test]
async fn test_media_request_is_chat() {
    let model = ScriptedModel::new([email_action("Here's a song for you.", json!({ "to": "marta" }))]);
    let dispatcher = RecordingDispatcher::new();
    let bot = orchestrator(model, dispatcher.clone());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "play a song for marta").await;
    assert_eq!(reply, "Here's a song for you.");
    assert!(state.pending().is_none());
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_contact_is_reported() {
    let model = ScriptedModel::new([email_action("", json!({ "to": "Zed" }))]);
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "email zed").await;
    assert_eq!(reply, "I couldn't find that contact. Please say or spell the address.");
    assert!(state.pending().is_none());
}

#[tokio::test]
async fn test_dispatch_failure_keeps_task_for_retry() {
    let model = ScriptedModel::new([email_action("", json!({ "to": "john smith" }))]);
    let dispatcher = RecordingDispatcher::failing(1);
    let bot = orchestrator(model, dispatcher.clone());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "email john smith").await;
    assert_eq!(reply, "What message should I send to john@example.com?");

    let reply = say(&bot, &mut state, "the report is ready").await;
    assert!(reply.starts_with("Sorry, I couldn't send the e-mail."), "{}", reply);
    assert!(reply.contains("The mail server is unavailable."));
    let pending = state.pending().expect("task kept after failure");
    assert_eq!(pending.step, TaskStep::AwaitingBody);
    assert_eq!(pending.body(), Some("the report is ready"));

    let reply = say(&bot, &mut state, "yes").await;
    assert_eq!(reply, "I've sent your message to john@example.com.");
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "the report is ready");
}

#[tokio::test]
async fn test_unsupported_action_is_reported() {
    let model = ScriptedModel::new([json!({
        "response": "Setting it.",
        "intent": "set_alarm",
        "action": { "type": "set_alarm", "parameters": { "time": "7am" } }
    })
    .to_string()]);
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "wake me at seven").await;
    assert_eq!(reply, "I'm not set up for the action \"set_alarm\".");
    assert!(state.pending().is_none());
}

#[tokio::test]
async fn test_plain_text_reply_is_spoken() {
    let model = ScriptedModel::new(["Hello there! *waves* How are you?"]);
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "hi").await;
    assert_eq!(reply, "Hello there! waves How are you?");
    assert_eq!(state.context().last().unwrap().intent, "unknown");
}

#[tokio::test]
async fn test_intent_without_action_starts_task() {
    let model = ScriptedModel::new([json!({ "response": "", "intent": "send_email" }).to_string()]);
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "marta").await;
    assert_eq!(reply, "Did you mean marta@x.com?");
}

#[tokio::test]
async fn test_empty_utterance_skips_model() {
    let model = ScriptedModel::new(Vec::<String>::new());
    let bot = orchestrator(model.clone(), RecordingDispatcher::new());
    let mut state = ConversationState::default();

    assert_eq!(say(&bot, &mut state, "   ").await, MISSED_REPLY);

    let noisy = Utterance {
        text: String::new(),
        avg_logprob: Some(-2.0),
        no_speech_prob: Some(0.9),
    };
    assert_eq!(bot.handle_turn(&mut state, &noisy).await, CLARIFY_REPLY);
    assert_eq!(model.calls(), 0);
    assert_eq!(state.version, 0);
}

#[tokio::test]
async fn test_empty_model_response_falls_back() {
    let model = ScriptedModel::new([chat(""), chat("")]);
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    assert_eq!(say(&bot, &mut state, "hmm").await, MISSED_REPLY);

    let unsure = Utterance {
        text: "mumble".to_string(),
        avg_logprob: Some(-1.5),
        no_speech_prob: None,
    };
    assert_eq!(bot.handle_turn(&mut state, &unsure).await, CLARIFY_REPLY);
}

#[tokio::test]
async fn test_model_failure_leaves_state_alone() {
    let model = ScriptedModel::new(Vec::<String>::new());
    let bot = orchestrator(model, RecordingDispatcher::new());
    let mut state = ConversationState::default();

    let reply = say(&bot, &mut state, "what's the weather").await;
    assert_eq!(reply, MODEL_FAILURE_REPLY);
    assert_eq!(state.version, 0);
    assert!(state.context().is_empty());
}
