use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::config::{BookingMode, WizardConfig};
use crate::models::{
    BookingDraft, BookingResult, CalendarDay, ContactDetails, Service, Slot, StaffOption,
};
use crate::services::booking_api::http::HttpBookingApi;
use crate::services::booking_api::preview::PreviewBookingApi;
use crate::services::booking_api::BookingApi;
use crate::services::day_model::CalendarModel;
use crate::services::resolver::{AvailabilityResolver, AvailabilitySource, Resolution};
use crate::services::submitter::{BookingSubmitter, SubmitError};

pub const CLOSED_DAY_MESSAGE: &str = "We're closed on this day. Please choose another date.";
pub const FULLY_BOOKED_MESSAGE: &str = "No times are available on this day. Please choose another date.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    CatalogSelect,
    DateSelect,
    TimeSelect,
    StaffSelect,
    ContactDetails,
    Confirmation,
}

impl WizardStep {
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::CatalogSelect => 1,
            WizardStep::DateSelect => 2,
            WizardStep::TimeSelect => 3,
            WizardStep::StaffSelect => 4,
            WizardStep::ContactDetails => 5,
            WizardStep::Confirmation => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStep::CatalogSelect => "catalog_select",
            WizardStep::DateSelect => "date_select",
            WizardStep::TimeSelect => "time_select",
            WizardStep::StaffSelect => "staff_select",
            WizardStep::ContactDetails => "contact_details",
            WizardStep::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the time step currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeStepView {
    Loading,
    Closed,
    Slots {
        slots: Vec<Slot>,
        source: AvailabilitySource,
    },
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    CatalogLoaded(Vec<Service>),
    SelectService(Service),
    PreviousMonth,
    NextMonth,
    SelectDate(NaiveDate),
    RetryAvailability,
    SelectSlot(String),
    SelectStaff(String),
    UpdateContact(ContactDetails),
    Submit,
    /// A "change X" back-link.
    GoBack(WizardStep),
    BookAnother,
}

/// Identifies the availability request a response belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTicket {
    generation: u64,
    pub date: NaiveDate,
    pub service_id: Option<String>,
}

/// Identifies the submission a response belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    generation: u64,
    pub draft: BookingDraft,
    pub idempotency_key: String,
}

/// Work a transition asks the driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Resolve(ResolveTicket),
    Submit(SubmitTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    StepChanged { from: WizardStep, to: WizardStep },
    SlotsLoaded { date: NaiveDate, available: usize, total: usize },
    DayClosed { date: NaiveDate },
    AvailabilityUnreachable { date: NaiveDate },
    StaleResponseIgnored,
    SubmissionStarted,
    Booked { reference: String },
    Conflict,
    SubmissionFailed { message: String },
    Reset,
}

/// A transition the current state does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("{action} is not possible on the {step} step")]
    WrongStep {
        action: &'static str,
        step: WizardStep,
    },

    #[error("{0} is not a bookable date")]
    DateNotClickable(NaiveDate),

    #[error("available times have not been loaded")]
    SlotsNotLoaded,

    #[error("{0} is not an available time")]
    SlotUnavailable(String),

    #[error("service {0} is not in the catalog")]
    UnknownService(String),

    #[error("unknown staff member: {0}")]
    UnknownStaff(String),

    #[error("{0} is required")]
    MissingContact(&'static str),

    #[error("a booking is already being submitted")]
    SubmissionInFlight,

    #[error("cannot go back to the {0} step")]
    InvalidBackTarget(WizardStep),
}

/// The booking wizard as a plain state machine.
///
/// [`WizardState::apply`] is the transition function. Transitions that need
/// the backend return an [`Effect`]; its outcome is fed back through
/// [`WizardState::on_resolved`] or [`WizardState::on_submitted`], which drop
/// responses whose ticket no longer matches the current step.
#[derive(Debug, Clone)]
pub struct WizardState {
    step: WizardStep,
    catalog: Vec<Service>,
    calendar: CalendarModel,
    draft: BookingDraft,
    time_view: Option<TimeStepView>,
    // Decided once per time-step entry: Some when the customer picks staff.
    staff_options: Option<Vec<StaffOption>>,
    submitting: bool,
    error: Option<String>,
    result: Option<BookingResult>,
    idempotency_key: Option<String>,
    generation: u64,
    events: Vec<WizardEvent>,
}

impl WizardState {
    pub fn new(
        today: NaiveDate,
        min_bookable: Option<NaiveDate>,
        available_days: Option<BTreeSet<NaiveDate>>,
    ) -> Self {
        Self {
            step: WizardStep::CatalogSelect,
            catalog: vec![],
            calendar: CalendarModel::new(today, min_bookable, available_days),
            draft: BookingDraft::default(),
            time_view: None,
            staff_options: None,
            submitting: false,
            error: None,
            result: None,
            idempotency_key: None,
            generation: 0,
            events: vec![],
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn catalog(&self) -> &[Service] {
        &self.catalog
    }

    /// `"All"` followed by each distinct category in catalog order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec!["All".to_string()];
        for category in self.catalog.iter().filter_map(|s| s.category.as_ref()) {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }

    pub fn services_in(&self, category: &str) -> Vec<&Service> {
        self.catalog
            .iter()
            .filter(|s| category == "All" || s.category.as_deref() == Some(category))
            .collect()
    }

    pub fn calendar(&self) -> &CalendarModel {
        &self.calendar
    }

    pub fn calendar_days(&self) -> Vec<CalendarDay> {
        self.calendar.days(self.draft.date)
    }

    pub fn time_view(&self) -> Option<&TimeStepView> {
        self.time_view.as_ref()
    }

    pub fn slots(&self) -> &[Slot] {
        match &self.time_view {
            Some(TimeStepView::Slots { slots, .. }) => slots,
            _ => &[],
        }
    }

    pub fn staff_options(&self) -> Option<&[StaffOption]> {
        self.staff_options.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        self.step == WizardStep::ContactDetails
            && !self.submitting
            && !self.draft.contact.name.trim().is_empty()
            && !self.draft.contact.email.trim().is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Non-error guidance for a day that cannot be booked.
    pub fn guidance(&self) -> Option<&'static str> {
        match &self.time_view {
            Some(TimeStepView::Closed) => Some(CLOSED_DAY_MESSAGE),
            Some(TimeStepView::Slots { slots, .. }) if !slots.iter().any(|s| s.available) => {
                Some(FULLY_BOOKED_MESSAGE)
            }
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&BookingResult> {
        self.result.as_ref()
    }

    /// Drains the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<WizardEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn apply(&mut self, action: WizardAction) -> Result<Effect, WizardError> {
        match action {
            WizardAction::CatalogLoaded(services) => {
                self.expect_step(WizardStep::CatalogSelect, "loading the catalog")?;
                self.catalog = services;
                if self.catalog.is_empty() {
                    self.change_step(WizardStep::DateSelect);
                }
                Ok(Effect::None)
            }
            WizardAction::SelectService(service) => {
                self.expect_step(WizardStep::CatalogSelect, "choosing a service")?;
                let Some(service) = self.catalog.iter().find(|s| s.id == service.id).cloned()
                else {
                    return Err(WizardError::UnknownService(service.id));
                };
                self.draft.service = Some(service);
                self.idempotency_key = None;
                self.change_step(WizardStep::DateSelect);
                Ok(Effect::None)
            }
            WizardAction::PreviousMonth => {
                self.expect_step(WizardStep::DateSelect, "changing month")?;
                self.calendar.go_previous();
                Ok(Effect::None)
            }
            WizardAction::NextMonth => {
                self.expect_step(WizardStep::DateSelect, "changing month")?;
                self.calendar.go_next();
                Ok(Effect::None)
            }
            WizardAction::SelectDate(date) => {
                self.expect_step(WizardStep::DateSelect, "choosing a date")?;
                if !self.calendar.is_clickable(date) {
                    return Err(WizardError::DateNotClickable(date));
                }
                self.draft.date = Some(date);
                self.error = None;
                Ok(self.enter_time_step())
            }
            WizardAction::RetryAvailability => {
                self.expect_step(WizardStep::TimeSelect, "reloading times")?;
                Ok(self.enter_time_step())
            }
            WizardAction::SelectSlot(time) => {
                self.expect_step(WizardStep::TimeSelect, "choosing a time")?;
                match &self.time_view {
                    Some(TimeStepView::Slots { slots, .. }) => {
                        if !slots.iter().any(|s| s.time == time && s.available) {
                            return Err(WizardError::SlotUnavailable(time));
                        }
                    }
                    Some(TimeStepView::Closed) => return Err(WizardError::SlotUnavailable(time)),
                    _ => return Err(WizardError::SlotsNotLoaded),
                }
                self.draft.time = Some(time);
                self.error = None;
                self.idempotency_key = None;
                if self.staff_options.is_some() {
                    self.change_step(WizardStep::StaffSelect);
                } else {
                    self.change_step(WizardStep::ContactDetails);
                }
                Ok(Effect::None)
            }
            WizardAction::SelectStaff(id) => {
                self.expect_step(WizardStep::StaffSelect, "choosing staff")?;
                let known = self
                    .staff_options
                    .as_ref()
                    .is_some_and(|options| options.iter().any(|s| s.id == id));
                if !known {
                    return Err(WizardError::UnknownStaff(id));
                }
                self.draft.staff_id = Some(id);
                self.idempotency_key = None;
                self.change_step(WizardStep::ContactDetails);
                Ok(Effect::None)
            }
            WizardAction::UpdateContact(contact) => {
                self.expect_step(WizardStep::ContactDetails, "editing contact details")?;
                if self.submitting {
                    return Err(WizardError::SubmissionInFlight);
                }
                if contact != self.draft.contact {
                    self.idempotency_key = None;
                }
                self.draft.contact = contact;
                Ok(Effect::None)
            }
            WizardAction::Submit => self.begin_submit(),
            WizardAction::GoBack(target) => self.go_back(target),
            WizardAction::BookAnother => {
                self.expect_step(WizardStep::Confirmation, "starting over")?;
                self.draft = BookingDraft::default();
                self.time_view = None;
                self.staff_options = None;
                self.error = None;
                self.result = None;
                self.idempotency_key = None;
                self.calendar.reset();
                self.events.push(WizardEvent::Reset);
                if self.catalog.is_empty() {
                    self.change_step(WizardStep::DateSelect);
                } else {
                    self.change_step(WizardStep::CatalogSelect);
                }
                Ok(Effect::None)
            }
        }
    }

    /// Applies an availability response. Returns false when the response is stale.
    pub fn on_resolved(&mut self, ticket: &ResolveTicket, resolution: Resolution) -> bool {
        if ticket.generation != self.generation || self.step != WizardStep::TimeSelect {
            tracing::debug!(date = %ticket.date, step = self.step.as_str(), "ignoring stale availability response");
            self.events.push(WizardEvent::StaleResponseIgnored);
            return false;
        }

        match resolution {
            Resolution::Closed => {
                self.time_view = Some(TimeStepView::Closed);
                self.staff_options = None;
                self.events.push(WizardEvent::DayClosed { date: ticket.date });
            }
            Resolution::Open(day) => {
                let slots = day.slots();
                self.staff_options = day.offers_staff_choice().then(|| day.staff.clone());
                self.events.push(WizardEvent::SlotsLoaded {
                    date: ticket.date,
                    available: slots.iter().filter(|s| s.available).count(),
                    total: slots.len(),
                });
                self.time_view = Some(TimeStepView::Slots {
                    slots,
                    source: day.source,
                });
            }
            Resolution::Unreachable(message) => {
                self.time_view = Some(TimeStepView::Unreachable(message));
                self.staff_options = None;
                self.events.push(WizardEvent::AvailabilityUnreachable { date: ticket.date });
            }
        }
        true
    }

    /// Applies a submission outcome. A conflict sends the wizard back to the
    /// time step and asks for fresh availability.
    pub fn on_submitted(
        &mut self,
        ticket: &SubmitTicket,
        outcome: Result<BookingResult, SubmitError>,
    ) -> Effect {
        if ticket.generation != self.generation || self.step != WizardStep::ContactDetails {
            tracing::debug!(step = self.step.as_str(), "ignoring stale submission response");
            self.submitting = false;
            self.events.push(WizardEvent::StaleResponseIgnored);
            return Effect::None;
        }
        self.submitting = false;

        match outcome {
            Ok(result) => {
                self.events.push(WizardEvent::Booked {
                    reference: result.reference_code.clone(),
                });
                self.result = Some(result);
                self.idempotency_key = None;
                self.change_step(WizardStep::Confirmation);
                Effect::None
            }
            Err(SubmitError::Conflict(message)) => {
                self.error = Some(message);
                self.idempotency_key = None;
                self.events.push(WizardEvent::Conflict);
                self.enter_time_step()
            }
            Err(SubmitError::Validation(message)) | Err(SubmitError::Transport(message)) => {
                self.events.push(WizardEvent::SubmissionFailed {
                    message: message.clone(),
                });
                self.error = Some(message);
                Effect::None
            }
        }
    }

    fn begin_submit(&mut self) -> Result<Effect, WizardError> {
        self.expect_step(WizardStep::ContactDetails, "submitting")?;
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        if self.draft.contact.name.trim().is_empty() {
            self.error = Some("Please enter your name.".to_string());
            return Err(WizardError::MissingContact("name"));
        }
        if self.draft.contact.email.trim().is_empty() {
            self.error = Some("Please enter your email.".to_string());
            return Err(WizardError::MissingContact("email"));
        }
        if self.draft.date.is_none() || self.draft.time.is_none() {
            return Err(WizardError::SlotsNotLoaded);
        }

        // Reused across retries of an unchanged draft.
        let key = self
            .idempotency_key
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();

        self.submitting = true;
        self.error = None;
        self.events.push(WizardEvent::SubmissionStarted);

        Ok(Effect::Submit(SubmitTicket {
            generation: self.generation,
            draft: self.draft.clone(),
            idempotency_key: key,
        }))
    }

    fn go_back(&mut self, target: WizardStep) -> Result<Effect, WizardError> {
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        let valid = target < self.step
            && self.step != WizardStep::Confirmation
            && (target != WizardStep::StaffSelect || self.staff_options.is_some())
            && (target != WizardStep::CatalogSelect || !self.catalog.is_empty());
        if !valid {
            return Err(WizardError::InvalidBackTarget(target));
        }

        self.error = None;
        self.idempotency_key = None;
        self.draft.contact = ContactDetails::default();

        match target {
            WizardStep::CatalogSelect | WizardStep::DateSelect => {
                if target == WizardStep::CatalogSelect {
                    self.draft.date = None;
                }
                self.draft.time = None;
                self.draft.staff_id = None;
                self.time_view = None;
                self.staff_options = None;
                if let Some(date) = self.draft.date {
                    self.calendar.show(date);
                }
                self.change_step(target);
                Ok(Effect::None)
            }
            WizardStep::TimeSelect => Ok(self.enter_time_step()),
            _ => {
                self.change_step(target);
                Ok(Effect::None)
            }
        }
    }

    /// Clears the time selection and everything after it, then requests fresh
    /// availability for the selected date.
    fn enter_time_step(&mut self) -> Effect {
        let Some(date) = self.draft.date else {
            return Effect::None;
        };
        self.draft.time = None;
        self.draft.staff_id = None;
        self.staff_options = None;
        self.time_view = Some(TimeStepView::Loading);
        self.change_step(WizardStep::TimeSelect);
        self.generation += 1;

        Effect::Resolve(ResolveTicket {
            generation: self.generation,
            date,
            service_id: self.draft.service.as_ref().map(|s| s.id.clone()),
        })
    }

    fn change_step(&mut self, to: WizardStep) {
        let from = self.step;
        if from == to {
            return;
        }
        self.step = to;
        self.generation += 1;
        tracing::debug!(from = from.as_str(), to = to.as_str(), "wizard step changed");
        self.events.push(WizardEvent::StepChanged { from, to });
    }

    fn expect_step(&self, step: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == step {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                action,
                step: self.step,
            })
        }
    }
}

/// Drives a [`WizardState`] against a backend, running each effect to
/// completion and publishing events to subscribers.
pub struct BookingWizard {
    state: WizardState,
    api: Arc<dyn BookingApi>,
    resolver: AvailabilityResolver,
    submitter: BookingSubmitter,
    events: broadcast::Sender<WizardEvent>,
}

impl BookingWizard {
    pub fn new(config: &WizardConfig, today: NaiveDate) -> Self {
        let api: Arc<dyn BookingApi> = match config.effective_mode() {
            BookingMode::Preview => {
                if config.mode != BookingMode::Preview {
                    tracing::warn!("no business configured, running booking wizard in preview mode");
                }
                Arc::new(PreviewBookingApi::new())
            }
            BookingMode::Live { .. } => Arc::new(HttpBookingApi::new(
                config.base_url.clone(),
                config.subdomain.clone().unwrap_or_default(),
            )),
        };
        Self::with_api(config, api, today)
    }

    pub fn with_api(config: &WizardConfig, api: Arc<dyn BookingApi>, today: NaiveDate) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: WizardState::new(
                today,
                config.min_bookable_date,
                config.available_days.clone(),
            ),
            resolver: AvailabilityResolver::new(api.clone(), config.effective_mode()),
            submitter: BookingSubmitter::new(
                api.clone(),
                config.subdomain.clone().unwrap_or_default(),
            ),
            api,
            events,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    /// Loads the service catalog. An unavailable catalog skips service selection.
    pub async fn start(&mut self) -> Result<(), WizardError> {
        let services = match self.api.list_services().await {
            Ok(services) => services,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load service catalog");
                vec![]
            }
        };
        tracing::info!(services = services.len(), "booking wizard started");
        self.dispatch(WizardAction::CatalogLoaded(services)).await
    }

    pub async fn dispatch(&mut self, action: WizardAction) -> Result<(), WizardError> {
        let applied = self.state.apply(action);
        self.publish();
        let mut effect = applied?;

        loop {
            effect = match effect {
                Effect::None => break,
                Effect::Resolve(ticket) => {
                    let resolution = self
                        .resolver
                        .resolve(ticket.date, ticket.service_id.as_deref())
                        .await;
                    self.state.on_resolved(&ticket, resolution);
                    Effect::None
                }
                Effect::Submit(ticket) => {
                    let outcome = self
                        .submitter
                        .submit(&ticket.draft, &ticket.idempotency_key)
                        .await;
                    self.state.on_submitted(&ticket, outcome)
                }
            };
            self.publish();
        }
        Ok(())
    }

    fn publish(&mut self) {
        for event in self.state.take_events() {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}
