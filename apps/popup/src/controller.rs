//! View-model for the popup: transcript lines, the progress indicator, and
//! the three entry points of the presentation controller. Pure state
//! transitions; the rendering shell lives in `main.rs`.

use dispatcher::SubmitError;
use shared::{
    domain::{InteractionRecord, InteractionStatus, RequestId},
    protocol::AskIntent,
};

pub const THINKING_INDICATOR: &str = "Thinking... (the request keeps running if you close this)";
pub const ERROR_INDICATOR: &str = "Error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptLine {
    User(String),
    Ai(String),
    Error(String),
    Info(String),
}

/// Transient per-popup state, rebuilt from the store on every open.
#[derive(Debug, Default)]
pub struct PopupController {
    transcript: Vec<TranscriptLine>,
    indicator: Option<&'static str>,
    /// Request whose outcome is already in the transcript. Outcomes are
    /// deduplicated by id, never by answer text.
    rendered_request: Option<RequestId>,
    /// Request submitted from this popup instance; its query line is already
    /// shown, so the completion only appends the answer.
    pending_request: Option<RequestId>,
}

impl PopupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    pub fn indicator(&self) -> Option<&'static str> {
        self.indicator
    }

    /// Popup opened: reconstruct the last known interaction from the store.
    pub fn on_open(&mut self, latest: Option<&InteractionRecord>) {
        self.transcript.clear();
        self.indicator = None;
        self.rendered_request = None;
        self.pending_request = None;

        let Some(record) = latest else {
            return;
        };

        match record.status {
            InteractionStatus::Loading => {
                self.transcript
                    .push(TranscriptLine::User(record.query.clone()));
                self.indicator = Some(THINKING_INDICATOR);
                // The query line is already on screen; the completion for
                // this id must only append the answer.
                self.pending_request = Some(record.request_id);
            }
            InteractionStatus::Complete => {
                self.transcript
                    .push(TranscriptLine::User(record.query.clone()));
                self.transcript
                    .push(TranscriptLine::Ai(record.answer.clone().unwrap_or_default()));
                self.rendered_request = Some(record.request_id);
            }
            InteractionStatus::Error => {
                self.transcript
                    .push(TranscriptLine::Error(record.error.clone().unwrap_or_default()));
                self.rendered_request = Some(record.request_id);
            }
        }
    }

    /// Store changed while the popup is open. The notification carries the
    /// full new record, so nothing is re-read.
    pub fn on_change(&mut self, record: &InteractionRecord) {
        match record.status {
            InteractionStatus::Loading => {
                self.indicator = Some(THINKING_INDICATOR);
            }
            InteractionStatus::Complete => {
                self.indicator = None;
                if self.rendered_request == Some(record.request_id) {
                    return;
                }
                if self.pending_request != Some(record.request_id) {
                    self.transcript
                        .push(TranscriptLine::User(record.query.clone()));
                }
                self.transcript
                    .push(TranscriptLine::Ai(record.answer.clone().unwrap_or_default()));
                self.rendered_request = Some(record.request_id);
                self.pending_request = None;
            }
            InteractionStatus::Error => {
                self.indicator = Some(ERROR_INDICATOR);
                if self.rendered_request == Some(record.request_id) {
                    return;
                }
                self.transcript
                    .push(TranscriptLine::Error(record.error.clone().unwrap_or_default()));
                self.rendered_request = Some(record.request_id);
                self.pending_request = None;
            }
        }
    }

    /// User pressed ask. Empty input is a no-op; otherwise the intent for
    /// the dispatcher is returned. The view is left untouched until the
    /// dispatcher acknowledges, so a rejected submit never discards the
    /// in-flight interaction.
    pub fn on_submit(&self, input: &str, page_url: &str) -> Option<AskIntent> {
        let query = input.trim();
        if query.is_empty() {
            return None;
        }

        Some(AskIntent {
            url: page_url.to_string(),
            query: query.to_string(),
        })
    }

    /// The dispatcher accepted the intent under `request_id`: reset the view
    /// to the new query line.
    pub fn on_submit_accepted(&mut self, request_id: RequestId, query: &str) {
        self.transcript.clear();
        self.transcript.push(TranscriptLine::User(query.to_string()));
        self.indicator = None;
        self.rendered_request = None;
        self.pending_request = Some(request_id);
    }

    /// The dispatcher refused the intent; surface it instead of silently
    /// dropping the click.
    pub fn on_submit_rejected(&mut self, err: &SubmitError) {
        let message = match err {
            SubmitError::Busy => "A request is still in flight; wait for it to finish.",
            SubmitError::Closed => "The dispatcher is not running; restart the app.",
        };
        self.transcript
            .push(TranscriptLine::Info(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_record(query: &str, answer: &str) -> InteractionRecord {
        InteractionRecord::complete(RequestId::new(), query, answer)
    }

    #[test]
    fn open_with_empty_store_renders_nothing() {
        let mut controller = PopupController::new();
        controller.on_open(None);
        assert!(controller.transcript().is_empty());
        assert!(controller.indicator().is_none());
    }

    #[test]
    fn open_with_loading_record_shows_query_and_indicator() {
        let record = InteractionRecord::loading(RequestId::new(), "What is this page about?");
        let mut controller = PopupController::new();
        controller.on_open(Some(&record));

        assert_eq!(
            controller.transcript(),
            &[TranscriptLine::User("What is this page about?".into())]
        );
        assert_eq!(controller.indicator(), Some(THINKING_INDICATOR));
    }

    #[test]
    fn open_with_complete_record_reconstructs_transcript_without_backend() {
        let record = complete_record("What is this page about?", "A summary.");
        let mut controller = PopupController::new();
        controller.on_open(Some(&record));

        assert_eq!(
            controller.transcript(),
            &[
                TranscriptLine::User("What is this page about?".into()),
                TranscriptLine::Ai("A summary.".into()),
            ]
        );
        assert!(controller.indicator().is_none());
    }

    #[test]
    fn open_with_error_record_shows_only_the_error() {
        let record =
            InteractionRecord::error(RequestId::new(), "q", "Could not connect to backend.");
        let mut controller = PopupController::new();
        controller.on_open(Some(&record));

        assert_eq!(
            controller.transcript(),
            &[TranscriptLine::Error("Could not connect to backend.".into())]
        );
    }

    #[test]
    fn accepted_submit_resets_transcript_to_new_query() {
        let mut controller = PopupController::new();
        controller.on_open(Some(&complete_record("old", "old answer")));

        let intent = controller
            .on_submit("  new question  ", "https://example.com")
            .expect("intent");
        assert_eq!(intent.query, "new question");
        assert_eq!(intent.url, "https://example.com");
        // Not yet acknowledged: the previous interaction stays visible.
        assert_eq!(controller.transcript().len(), 2);

        controller.on_submit_accepted(RequestId::new(), &intent.query);
        assert_eq!(
            controller.transcript(),
            &[TranscriptLine::User("new question".into())]
        );
    }

    #[test]
    fn empty_submit_is_a_no_op() {
        let mut controller = PopupController::new();
        controller.on_open(Some(&complete_record("old", "old answer")));

        assert!(controller.on_submit("   ", "https://example.com").is_none());
        // View untouched: no reset, no intent, nothing dispatched.
        assert_eq!(controller.transcript().len(), 2);
    }

    #[test]
    fn change_cycle_appends_answer_once_for_own_request() {
        let mut controller = PopupController::new();
        let intent = controller
            .on_submit("What is this page about?", "https://example.com")
            .expect("intent");
        let request_id = RequestId::new();
        controller.on_submit_accepted(request_id, &intent.query);

        let loading = InteractionRecord::loading(request_id, intent.query.clone());
        controller.on_change(&loading);
        assert_eq!(controller.indicator(), Some(THINKING_INDICATOR));

        let complete = InteractionRecord::complete(request_id, intent.query, "A summary.");
        controller.on_change(&complete);

        assert_eq!(
            controller.transcript(),
            &[
                TranscriptLine::User("What is this page about?".into()),
                TranscriptLine::Ai("A summary.".into()),
            ]
        );
        assert!(controller.indicator().is_none());

        // Redelivery of the same record must not duplicate the pair, even
        // when the answer text is identical.
        controller.on_change(&complete);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[test]
    fn change_from_another_instance_appends_query_and_answer() {
        let mut controller = PopupController::new();
        controller.on_open(None);

        let record = complete_record("asked elsewhere", "its answer");
        controller.on_change(&record);

        assert_eq!(
            controller.transcript(),
            &[
                TranscriptLine::User("asked elsewhere".into()),
                TranscriptLine::Ai("its answer".into()),
            ]
        );
    }

    #[test]
    fn repeated_identical_answers_from_distinct_requests_both_render() {
        let mut controller = PopupController::new();
        controller.on_open(None);

        controller.on_change(&complete_record("q", "same text"));
        controller.on_change(&complete_record("q", "same text"));

        assert_eq!(controller.transcript().len(), 4);
    }

    #[test]
    fn error_change_shows_error_line_and_indicator() {
        let mut controller = PopupController::new();
        let intent = controller
            .on_submit("q", "https://example.com")
            .expect("intent");
        let request_id = RequestId::new();
        controller.on_submit_accepted(request_id, &intent.query);
        controller.on_change(&InteractionRecord::loading(request_id, intent.query.clone()));

        controller.on_change(&InteractionRecord::error(
            request_id,
            intent.query,
            "Could not connect to backend.",
        ));

        assert_eq!(controller.indicator(), Some(ERROR_INDICATOR));
        assert_eq!(
            controller.transcript(),
            &[
                TranscriptLine::User("q".into()),
                TranscriptLine::Error("Could not connect to backend.".into()),
            ]
        );
    }

    #[test]
    fn busy_rejection_keeps_in_flight_view_and_adds_info_line() {
        let mut controller = PopupController::new();
        let first = InteractionRecord::loading(RequestId::new(), "first question");
        controller.on_open(Some(&first));

        // The second ask is refused while the first is still in flight; the
        // first question must stay on screen with the rejection noted.
        assert!(controller.on_submit("second question", "https://example.com").is_some());
        controller.on_submit_rejected(&SubmitError::Busy);

        assert!(matches!(
            controller.transcript(),
            [TranscriptLine::User(_), TranscriptLine::Info(_)]
        ));
        assert_eq!(
            controller.transcript()[0],
            TranscriptLine::User("first question".into())
        );

        // The in-flight request's completion still lands in order.
        controller.on_change(&InteractionRecord::complete(
            first.request_id,
            first.query.clone(),
            "first answer",
        ));
        assert_eq!(
            controller.transcript(),
            &[
                TranscriptLine::User("first question".into()),
                TranscriptLine::Info(
                    "A request is still in flight; wait for it to finish.".into()
                ),
                TranscriptLine::Ai("first answer".into()),
            ]
        );
    }

    #[test]
    fn open_during_loading_completion_appends_answer_once() {
        let request_id = RequestId::new();
        let loading = InteractionRecord::loading(request_id, "q");
        let mut controller = PopupController::new();
        controller.on_open(Some(&loading));

        controller.on_change(&InteractionRecord::complete(request_id, "q", "a"));

        assert_eq!(
            controller.transcript(),
            &[
                TranscriptLine::User("q".into()),
                TranscriptLine::Ai("a".into()),
            ]
        );
        assert!(controller.indicator().is_none());
    }
}
