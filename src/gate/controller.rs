//! Admission controller
//!
//! `Gatekeeper` turns inbound events into quiz pass transitions and platform
//! calls. Each event is handled to completion inside one store transaction;
//! an error drops the transaction, which rolls it back.

use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::gate::error::GateResult;
use crate::gate::event::{
    ButtonAction, Chat, CommandInvocation, GateCommand, GateEvent, MessageRef, SystemMessageKind,
    UserRef,
};
use crate::gate::platform::{Button, ChatPlatform, Markup, MemberPermissions};
use crate::gate::policy::{is_admin, resolve_target};
use crate::gate::render::render_current_item;
use crate::gate::timer::KickScheduler;
use crate::messages;
use crate::questions::{QuestionBank, QuestionSampler, RandomSampler};
use crate::quiz::{PassStatus, QuizPass, QuizStore};
use crate::{ERROR_TARGET, QUIZ_TARGET};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const MILLIS_PER_HOUR: u64 = 3_600_000;

/// Whether a user may start a new quiz pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    AlreadyStarted,
    AlreadyPassed,
    /// Failed too recently; `wait_hours` is the remaining wait rounded up
    Cooldown { wait_hours: u64 },
}

/// Decide whether a new pass may replace `pass`, the user's active one.
/// The cooldown runs from the last answer of a failed pass.
#[must_use]
pub fn admission(pass: Option<&QuizPass>, now: DateTime<Utc>, cooldown: Duration) -> Admission {
    let Some(pass) = pass else {
        return Admission::Allowed;
    };

    match pass.status() {
        PassStatus::InProgress => Admission::AlreadyStarted,
        PassStatus::Passed => Admission::AlreadyPassed,
        PassStatus::Failed => {
            let Some(last_answer_at) = pass.last_answer_at() else {
                return Admission::Allowed;
            };
            let remaining = cooldown - (now - last_answer_at);
            if remaining <= Duration::zero() {
                return Admission::Allowed;
            }
            // Any wait left is at least an hour, even below a millisecond
            let millis = u64::try_from(remaining.num_milliseconds()).unwrap_or(0);
            Admission::Cooldown {
                wait_hours: millis.div_ceil(MILLIS_PER_HOUR).max(1),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    /// Kick and unban right away, so the user may rejoin
    Kick,
    Ban,
}

/// The admission controller
pub struct Gatekeeper {
    store: QuizStore,
    bank: Arc<QuestionBank>,
    config: Arc<GateConfig>,
    platform: Arc<dyn ChatPlatform>,
    sampler: Arc<dyn QuestionSampler>,
    clock: Arc<dyn Clock>,
    timers: KickScheduler,
}

impl Gatekeeper {
    pub fn new(
        store: QuizStore,
        bank: Arc<QuestionBank>,
        config: Arc<GateConfig>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            store,
            bank,
            config,
            platform,
            sampler: Arc::new(RandomSampler),
            clock: Arc::new(SystemClock),
            timers: KickScheduler::new(),
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn QuestionSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn timers(&self) -> &KickScheduler {
        &self.timers
    }

    /// Handle one event to completion
    ///
    /// # Errors
    /// Returns an error if a store operation or a required platform call
    /// fails; nothing the event wrote is kept in that case
    pub async fn handle(&self, event: GateEvent) -> GateResult<()> {
        match event {
            GateEvent::MemberJoined {
                user,
                is_bot,
                announcement,
            } => self.on_member_joined(&user, is_bot, announcement).await,
            GateEvent::MemberLeft { user, announcement } => {
                info!(target: QUIZ_TARGET, user_id = user.id, name = %user.display_name, "Member left");
                if let Some(message) = announcement {
                    self.delete_announcement(message, SystemMessageKind::Leave)
                        .await?;
                }
                Ok(())
            }
            GateEvent::SystemMessage { message, kind } => {
                self.delete_announcement(message, kind).await
            }
            GateEvent::Command(invocation) => self.on_command(&invocation).await,
            GateEvent::ButtonPress {
                action,
                user,
                chat,
                message_id,
            } => self.on_button(action, &user, chat, message_id).await,
            GateEvent::InactivityTimeout { user_id } => self.on_inactivity_timeout(user_id).await,
            GateEvent::Shutdown => Ok(()),
        }
    }

    /// Fire every inactivity timer that is due, each as an `InactivityTimeout`
    /// event. A failing timer is logged and doesn't stop the others.
    pub async fn fire_due_timers(&self) {
        for timer in self.timers.take_due(self.clock.now()) {
            debug!(
                target: QUIZ_TARGET,
                timer_id = %timer.id,
                user_id = timer.user_id,
                scheduled_at = %timer.scheduled_at,
                "Inactivity timer fired"
            );
            let event = GateEvent::InactivityTimeout {
                user_id: timer.user_id,
            };
            if let Err(e) = self.handle(event).await {
                error!(target: ERROR_TARGET, user_id = timer.user_id, error = %e, "Inactivity timeout failed");
            }
        }
    }

    async fn on_member_joined(
        &self,
        user: &UserRef,
        is_bot: bool,
        announcement: Option<MessageRef>,
    ) -> GateResult<()> {
        if is_bot {
            debug!(target: QUIZ_TARGET, user_id = user.id, "Ignoring bot join");
        } else {
            info!(target: QUIZ_TARGET, user_id = user.id, name = %user.display_name, "New member joined");

            let mut tx = self.store.begin().await?;
            let pass = tx.active_pass(user.id).await?;
            let allowed_to_chat = pass.is_some_and(|pass| pass.status() == PassStatus::Passed);

            if !allowed_to_chat {
                self.platform
                    .restrict_member(user.id, MemberPermissions::Restricted)
                    .await?;
                let timer =
                    self.timers
                        .schedule(user.id, self.clock.now(), self.config.kick_delay());
                info!(
                    target: QUIZ_TARGET,
                    user_id = user.id,
                    kick_at = %timer.fire_at,
                    "Member restricted until the quiz is passed"
                );
            }
            tx.commit().await?;
        }

        if let Some(message) = announcement {
            self.delete_announcement(message, SystemMessageKind::Join)
                .await?;
        }
        Ok(())
    }

    async fn delete_announcement(
        &self,
        message: MessageRef,
        kind: SystemMessageKind,
    ) -> GateResult<()> {
        let enabled = match kind {
            SystemMessageKind::Join => self.config.delete_join_messages,
            SystemMessageKind::Leave => self.config.delete_leave_messages,
        };
        if enabled {
            self.platform.delete_message(message.chat, message.id).await?;
        }
        Ok(())
    }

    async fn on_inactivity_timeout(&self, user_id: u64) -> GateResult<()> {
        let mut tx = self.store.begin().await?;
        if tx.active_pass(user_id).await?.is_some() {
            debug!(target: QUIZ_TARGET, user_id, "Quiz started in time, keeping member");
            return Ok(tx.commit().await?);
        }

        self.remove_member(user_id, Removal::Kick).await?;
        info!(target: QUIZ_TARGET, user_id, "Member kicked for not starting the quiz");
        Ok(tx.commit().await?)
    }

    async fn on_command(&self, invocation: &CommandInvocation) -> GateResult<()> {
        match &invocation.command {
            GateCommand::Start => self.on_start(invocation).await,
            GateCommand::Kick => self.on_remove(invocation, Removal::Kick).await,
            GateCommand::Ban => self.on_remove(invocation, Removal::Ban).await,
            GateCommand::KickMe => self.on_kickme(invocation).await,
            GateCommand::Unknown(name) => {
                debug!(target: QUIZ_TARGET, command = %name, "Ignoring unknown command");
                Ok(())
            }
        }
    }

    async fn on_start(&self, invocation: &CommandInvocation) -> GateResult<()> {
        if !invocation.chat.is_private() {
            debug!(target: QUIZ_TARGET, user_id = invocation.sender.id, "Ignoring start outside of a private chat");
            return Ok(());
        }

        let user_id = invocation.sender.id;
        info!(target: QUIZ_TARGET, user_id, "Start requested");

        let mut tx = self.store.begin().await?;
        let pass = tx.active_pass(user_id).await?;
        if self.report_admission(user_id, pass.as_ref()).await? == Admission::Allowed {
            self.platform
                .send_message(
                    Chat::Direct(user_id),
                    &messages::getting_started(
                        self.config.questions_per_quiz,
                        self.config.correct_answers_required,
                    ),
                    Some(Markup::single(Button::new(
                        messages::START_QUIZ_LABEL,
                        ButtonAction::StartQuiz,
                    ))),
                )
                .await?;
        }
        Ok(tx.commit().await?)
    }

    /// Work out the admission of a user and tell them when they are blocked
    async fn report_admission(
        &self,
        user_id: u64,
        pass: Option<&QuizPass>,
    ) -> GateResult<Admission> {
        let decision = admission(pass, self.clock.now(), self.config.cooldown());
        let chat = Chat::Direct(user_id);

        match (decision, pass) {
            (Admission::AlreadyStarted, _) => {
                self.platform
                    .send_message(chat, messages::ALREADY_STARTED, None)
                    .await?;
            }
            (Admission::AlreadyPassed, Some(pass)) => {
                self.send_passed(pass).await?;
            }
            (Admission::Cooldown { wait_hours }, Some(pass)) => {
                self.send_failed(pass, wait_hours).await?;
            }
            _ => {}
        }

        info!(target: QUIZ_TARGET, user_id, admission = ?decision, "Admission decided");
        Ok(decision)
    }

    async fn send_passed(&self, pass: &QuizPass) -> GateResult<()> {
        self.platform
            .send_message(
                Chat::Direct(pass.user_id),
                &messages::passed(pass.correct_given(), pass.item_count()),
                Some(Markup::single(Button::new(
                    messages::SHARE_RESULT_LABEL,
                    ButtonAction::ShareResult,
                ))),
            )
            .await?;
        Ok(())
    }

    async fn send_failed(&self, pass: &QuizPass, wait_hours: u64) -> GateResult<()> {
        self.platform
            .send_message(
                Chat::Direct(pass.user_id),
                &messages::failed(
                    pass.correct_given(),
                    pass.item_count(),
                    pass.correct_required,
                    wait_hours,
                ),
                None,
            )
            .await?;
        Ok(())
    }

    async fn on_button(
        &self,
        action: ButtonAction,
        user: &UserRef,
        chat: Chat,
        message_id: u64,
    ) -> GateResult<()> {
        debug!(target: QUIZ_TARGET, user_id = user.id, action = %action, "Button pressed");
        match action {
            ButtonAction::Ignore => Ok(()),
            ButtonAction::StartQuiz => self.on_start_quiz(user.id, chat, message_id).await,
            ButtonAction::Next => self.on_navigate(user.id, chat, message_id, true).await,
            ButtonAction::Prev => self.on_navigate(user.id, chat, message_id, false).await,
            ButtonAction::Answer(answer) => {
                self.on_answer(user.id, chat, message_id, answer).await
            }
            ButtonAction::ShareResult => self.on_share(user).await,
            ButtonAction::Unknown(data) => {
                info!(target: QUIZ_TARGET, user_id = user.id, data = %data, "Unknown button action");
                Ok(())
            }
        }
    }

    async fn on_start_quiz(&self, user_id: u64, chat: Chat, message_id: u64) -> GateResult<()> {
        let mut tx = self.store.begin().await?;

        let pass = match tx.active_pass(user_id).await? {
            Some(pass) if !pass.is_finished() => pass,
            existing => {
                if self.report_admission(user_id, existing.as_ref()).await? != Admission::Allowed {
                    return Ok(tx.commit().await?);
                }
                let questions = self
                    .sampler
                    .sample(&self.bank, self.config.questions_per_quiz);
                let pass = tx
                    .create_pass(
                        user_id,
                        &questions,
                        self.config.correct_answers_required,
                        self.clock.now(),
                    )
                    .await?;
                info!(
                    target: QUIZ_TARGET,
                    user_id,
                    pass_id = pass.id,
                    questions = pass.item_count(),
                    "Quiz started"
                );
                pass
            }
        };

        self.display(chat, message_id, &pass).await?;
        Ok(tx.commit().await?)
    }

    async fn on_navigate(
        &self,
        user_id: u64,
        chat: Chat,
        message_id: u64,
        forward: bool,
    ) -> GateResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(mut pass) = tx.active_pass(user_id).await? else {
            return Ok(());
        };

        if forward {
            pass.move_to_next();
        } else {
            pass.move_to_prev();
        }
        tx.save_pass(&pass).await?;
        self.display(chat, message_id, &pass).await?;
        Ok(tx.commit().await?)
    }

    async fn on_answer(
        &self,
        user_id: u64,
        chat: Chat,
        message_id: u64,
        answer: usize,
    ) -> GateResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(mut pass) = tx.active_pass(user_id).await? else {
            return Ok(());
        };

        let recorded = pass.answer_current(answer, self.clock.now())?;
        if recorded {
            info!(
                target: QUIZ_TARGET,
                user_id,
                item = pass.current_item_index(),
                answer,
                "Answer recorded"
            );
            tx.save_pass(&pass).await?;
        }
        self.display(chat, message_id, &pass).await?;

        if recorded && pass.is_finished() {
            self.announce_outcome(&pass).await?;
        }
        Ok(tx.commit().await?)
    }

    async fn announce_outcome(&self, pass: &QuizPass) -> GateResult<()> {
        let user_id = pass.user_id;
        let result = pass.correct_given();
        let total = pass.item_count();

        if pass.has_passed() {
            info!(target: QUIZ_TARGET, user_id, result, total, "Quiz passed");
            self.send_passed(pass).await?;
            // Fails for members the platform won't touch, such as admins
            if let Err(e) = self
                .platform
                .restrict_member(user_id, MemberPermissions::Full)
                .await
            {
                warn!(target: QUIZ_TARGET, user_id, error = %e, "Could not lift the restriction");
            }
        } else {
            info!(
                target: QUIZ_TARGET,
                user_id,
                result,
                total,
                required = pass.correct_required,
                "Quiz failed"
            );
            self.send_failed(pass, self.config.wait_hours_on_fail)
                .await?;
        }
        Ok(())
    }

    async fn on_share(&self, user: &UserRef) -> GateResult<()> {
        let mut tx = self.store.begin().await?;
        let Some(mut pass) = tx.active_pass(user.id).await? else {
            return Ok(());
        };
        if !pass.can_share_result() {
            debug!(target: QUIZ_TARGET, user_id = user.id, "Result can't be shared");
            return Ok(tx.commit().await?);
        }

        self.platform
            .send_message(
                Chat::Channel(self.config.announce_channel_id),
                &messages::result_share(
                    &user.display_name,
                    pass.correct_given(),
                    pass.item_count(),
                ),
                None,
            )
            .await?;
        pass.result_shared = true;
        tx.save_pass(&pass).await?;
        info!(target: QUIZ_TARGET, user_id = user.id, "Result shared");
        Ok(tx.commit().await?)
    }

    async fn display(&self, chat: Chat, message_id: u64, pass: &QuizPass) -> GateResult<()> {
        let (text, markup) = render_current_item(pass)?;
        self.platform
            .edit_message(chat, message_id, &text, Some(markup))
            .await?;
        Ok(())
    }

    async fn on_remove(&self, invocation: &CommandInvocation, removal: Removal) -> GateResult<()> {
        let sender = &invocation.sender;
        if !is_admin(self.platform.as_ref(), sender.id).await? {
            info!(target: QUIZ_TARGET, user_id = sender.id, command = %invocation.command, "Unauthorized moderator command");
            self.platform
                .send_message(invocation.chat, messages::UNAUTHORIZED, None)
                .await?;
            return Ok(());
        }

        let Some(target) = resolve_target(invocation) else {
            self.platform
                .send_message(invocation.chat, messages::NO_TARGET, None)
                .await?;
            return Ok(());
        };

        info!(
            target: QUIZ_TARGET,
            user_id = sender.id,
            target_id = target.user_id,
            command = %invocation.command,
            "Removing member"
        );
        self.remove_member(target.user_id, removal).await?;
        self.forget_pass(target.user_id).await?;

        let label = target.label();
        let text = match removal {
            Removal::Kick => messages::kicked(&label),
            Removal::Ban => messages::banned(&label),
        };
        self.platform
            .send_message(invocation.chat, &text, None)
            .await?;
        Ok(())
    }

    async fn on_kickme(&self, invocation: &CommandInvocation) -> GateResult<()> {
        let user = &invocation.sender;
        info!(target: QUIZ_TARGET, user_id = user.id, "Member asked to be kicked");

        self.remove_member(user.id, Removal::Kick).await?;
        self.forget_pass(user.id).await?;
        self.platform
            .send_message(invocation.chat, &messages::kicked(&user.display_name), None)
            .await?;
        Ok(())
    }

    async fn remove_member(&self, user_id: u64, removal: Removal) -> GateResult<()> {
        match removal {
            Removal::Kick => {
                self.platform.kick_member(user_id).await?;
                self.platform.unban_member(user_id).await?;
            }
            Removal::Ban => self.platform.ban_member(user_id).await?,
        }
        Ok(())
    }

    /// Delete the active pass, so the user has to take the quiz again on rejoin
    async fn forget_pass(&self, user_id: u64) -> GateResult<()> {
        let mut tx = self.store.begin().await?;
        if let Some(pass) = tx.active_pass(user_id).await? {
            tx.delete_pass(pass.id).await?;
            info!(target: QUIZ_TARGET, user_id, pass_id = pass.id, "Quiz pass deleted");
        }
        Ok(tx.commit().await?)
    }
}
