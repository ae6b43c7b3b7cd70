//! Telegram front end. Polls for updates and forwards them to [`BotService`].

pub mod action;
pub mod keyboard;
pub mod report;
pub mod service;

pub use action::ButtonAction;
pub use keyboard::{Button, Keyboard};
pub use service::{Ack, AdminList, BotService, Caller, Reply, ReplySink, Timings};

use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Update, User},
};
use tracing::{error, info, warn};

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.encode()))
                .collect::<Vec<_>>()
        }))
    }
}

/// Sends replies as HTML messages to one chat.
struct TelegramSink {
    bot: Bot,
    chat: ChatId,
}

impl ReplySink for TelegramSink {
    async fn send(&self, reply: Reply) -> Result<()> {
        let mut request = self
            .bot
            .send_message(self.chat, reply.text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(InlineKeyboardMarkup::from(keyboard));
        }
        request.await?;
        Ok(())
    }
}

fn caller(user: &User) -> Caller {
    Caller {
        id: user.id.0,
        first_name: user.first_name.clone(),
    }
}

/// Runs the long-polling dispatcher until Ctrl-C.
pub async fn run(token: &str, service: Arc<BotService>) -> Result<()> {
    let bot = Bot::new(token);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    info!("Starting Telegram dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in Telegram handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    warn!("Telegram dispatcher stopped");
    Ok(())
}

async fn message_handler(bot: Bot, msg: Message, service: Arc<BotService>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };
    let sink = TelegramSink {
        bot,
        chat: msg.chat.id,
    };
    if let Err(e) = service.handle_text(&caller(user), text, &sink).await {
        error!("Error handling message from {}: {:#}", user.id, e);
    }
    Ok(())
}

async fn callback_handler(
    bot: Bot,
    query: CallbackQuery,
    service: Arc<BotService>,
) -> ResponseResult<()> {
    let data = query.data.clone().unwrap_or_default();

    match service.ack(query.from.id.0, &data) {
        Ack::Silent => bot.answer_callback_query(&query.id).await?,
        Ack::Toast(text) => bot.answer_callback_query(&query.id).text(text).await?,
        Ack::Alert(text) => {
            bot.answer_callback_query(&query.id)
                .text(text)
                .show_alert(true)
                .await?
        }
    };

    let Some(chat) = query.message.as_ref().map(|m| m.chat().id) else {
        return Ok(());
    };
    let sink = TelegramSink { bot, chat };
    if let Err(e) = service
        .handle_callback(&caller(&query.from), &data, &sink)
        .await
    {
        error!("Error handling callback {:?}: {:#}", data, e);
    }
    Ok(())
}
