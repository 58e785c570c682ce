mod ai_helper;
mod chat_log;
mod config;
mod learner;
mod profile;
mod quiz;
mod retry;
mod store;
mod tutor;
mod vocab;

use std::sync::Arc;

use ai_helper::QuizHelper;
use chat_log::Role;
use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use config::Config;
use dotenv::dotenv;
use learner::{LearnerContext, NextQuestion, Services, SubmitOutcome};
use log::{debug, info, warn};
use profile::stats::QuizDifficulty;
use quiz::session::QuizState;
use tutor::Tutor;
use vocab::VocabStore;
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup},
    utils::command::BotCommands,
};
use tokio::sync::Mutex;

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SharedContext = Arc<Mutex<LearnerContext>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Chatting,
    Quiz,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "start over.")]
    Start,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "take a grammar quiz.")]
    Quiz,
    #[command(description = "show the current question again.")]
    Next,
    #[command(description = "list your past quizzes.")]
    History,
    #[command(description = "show your accuracy.")]
    Stats,
    #[command(description = "rebuild your learner profile.")]
    Refresh,
}

type DialogueStorage = Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    info!("Starting grammar quiz bot...");

    let config = Config::from_env().expect("Invalid configuration");
    std::fs::create_dir_all(&config.data_dir).expect("Failed to create the data directory");

    let bot = Bot::from_env();

    info!("Opening dialogue storage at {:?}", config.dialogue_db_path());
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db_path().to_string_lossy(), Json)
        .await
        .expect("Failed to open dialogue storage")
        .erase();

    let gpt = {
        let mut gpt = ChatGPT::new(config.chatgpt_api_key.clone()).expect("Unable to connect with ChatGPT");

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = config.service_timeout;

        gpt
    };
    let quiz_helper = Arc::new(QuizHelper::new(gpt));

    let vocab = VocabStore::load(&config.vocab_path()).unwrap_or_else(|err| {
        warn!("Couldn't read the dictionary: {}", err);
        VocabStore::default()
    });
    let tutor = Arc::new(Tutor::new(quiz_helper.clone(), vocab, config.service_timeout));

    let context: SharedContext = Arc::new(Mutex::new(LearnerContext::new(
        &config,
        Services {
            completer: quiz_helper.clone(),
            summarizer: quiz_helper.clone(),
            explainer: quiz_helper.clone(),
        },
    )));

    let handler = Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(dptree::entry().filter_command::<Command>().endpoint(command))
        .branch(dptree::case![State::Start].endpoint(start))
        .branch(dptree::case![State::Quiz].endpoint(quiz_answer))
        .branch(dptree::case![State::Chatting].endpoint(chat));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, context, tutor, Arc::new(config)])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

const GREETING_TEXT: &str = "Hi! I'm your English grammar tutor. Chat with me about anything, and whenever you're ready, take a quiz built around the mistakes you make.";
const START_QUIZ_BUTTON: &str = "Start a quiz";

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(START_QUIZ_BUTTON)]])
}

fn answer_keyboard(choices: usize) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![(1..=choices)
        .map(|n| KeyboardButton::new(n.to_string()))
        .collect::<Vec<_>>()])
}

async fn send_question(bot: &Bot, msg: &Message, next: &NextQuestion) -> HandlerResult {
    bot.send_message(msg.chat.id, format!("{}\n\n{}", next.progress, next.text))
        .reply_markup(answer_keyboard(next.choices))
        .await?;
    Ok(())
}

async fn typing(bot: &Bot, msg: &Message) {
    if let Err(err) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
        debug!("Couldn't send typing action: {}", err);
    }
}

fn session_id(msg: &Message) -> String {
    format!("chat_{}", msg.chat.id)
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(menu_keyboard())
        .await?;

    dialogue.update(State::Chatting).await?;
    Ok(())
}

async fn command(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    cmd: Command,
    context: SharedContext,
    config: Arc<Config>,
) -> HandlerResult {
    match cmd {
        Command::Start => start(bot, dialogue, msg).await,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
            Ok(())
        }
        Command::Quiz => start_quiz(bot, dialogue, msg, context, config).await,
        Command::Next => {
            let context = context.lock().await;
            match (context.next_question(), context.state()) {
                (Some(next), _) => send_question(&bot, &msg, &next).await?,
                (None, QuizState::Completed { score, total }) => {
                    bot.send_message(
                        msg.chat.id,
                        format!("Your last quiz is finished ({}/{}). Send /quiz for a new one.", score, total),
                    )
                    .await?;
                }
                _ => {
                    bot.send_message(msg.chat.id, "No active quiz").await?;
                }
            }
            Ok(())
        }
        Command::History => {
            let history = context.lock().await.quiz_history();
            let text = if history.is_empty() {
                "You haven't finished any quizzes yet.".to_string()
            } else {
                history
                    .iter()
                    .rev()
                    .take(10)
                    .map(|entry| {
                        format!(
                            "{}: {}/{}",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.correct(),
                            entry.questions.len()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            bot.send_message(msg.chat.id, text).await?;
            Ok(())
        }
        Command::Stats => {
            let stats = context.lock().await.user_stats();
            let levels = stats
                .recent_levels
                .iter()
                .map(|grade| grade.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let text = format!(
                "Quizzes taken: {}\nCorrect answers (last 10 quizzes): {}/{}\nAverage accuracy: {:.0}%\nRecent levels: {}\nNext quizzes aim at: {}",
                stats.total_quizzes,
                stats.correct_answers,
                stats.total_questions,
                stats.average_accuracy * 100.0,
                if levels.is_empty() { "-".to_string() } else { levels },
                QuizDifficulty::from_accuracy(stats.average_accuracy).describe()
            );
            bot.send_message(msg.chat.id, text).await?;
            Ok(())
        }
        Command::Refresh => {
            context.lock().await.invalidate_profile_cache();
            bot.send_message(msg.chat.id, "Got it, I'll take a fresh look at your progress before the next quiz.")
                .await?;
            Ok(())
        }
    }
}

async fn start_quiz(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    context: SharedContext,
    config: Arc<Config>,
) -> HandlerResult {
    typing(&bot, &msg).await;

    let mut context = context.lock().await;
    let profile = context.prepare_quiz().await;
    debug!(
        "Quiz for skill {} with {} weak patterns",
        profile.overall_skill,
        profile.grammar_patterns.len()
    );

    let questions = context.generate_quiz(&profile, config.quiz_length).await;
    let next = match context.next_question() {
        Some(next) if !questions.is_empty() => next,
        _ => {
            bot.send_message(msg.chat.id, learner::NO_QUIZ_TEXT)
                .reply_markup(menu_keyboard())
                .await?;
            return Ok(());
        }
    };

    send_question(&bot, &msg, &next).await?;

    dialogue.update(State::Quiz).await?;
    Ok(())
}

async fn quiz_answer(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    context: SharedContext,
) -> HandlerResult {
    let choice = match msg.text().map(|t| t.trim().parse::<usize>()) {
        Some(Ok(choice)) => choice,
        _ => {
            bot.send_message(msg.chat.id, "Please answer with 1, 2, 3, or 4.")
                .await?;
            return Ok(());
        }
    };

    let mut context = context.lock().await;
    match context.submit_answer(choice) {
        SubmitOutcome::NotActive => {
            bot.send_message(msg.chat.id, learner::NOT_ACTIVE_TEXT)
                .reply_markup(menu_keyboard())
                .await?;
            dialogue.update(State::Chatting).await?;
        }
        SubmitOutcome::InvalidChoice { choices, .. } => {
            bot.send_message(
                msg.chat.id,
                format!("Please choose a number between 1 and {}.", choices),
            )
            .await?;
        }
        SubmitOutcome::Answered(feedback) => {
            let mut text = feedback.feedback.clone();
            if let Some(explanation) = &feedback.explanation {
                text = format!("{}\n\n{}", text, explanation);
            }
            bot.send_message(msg.chat.id, text).await?;

            if let Some(result) = &feedback.result {
                bot.send_message(msg.chat.id, learner::result_summary(result))
                    .reply_markup(menu_keyboard())
                    .await?;
                dialogue.update(State::Chatting).await?;
            } else if let Some(next) = context.next_question() {
                send_question(&bot, &msg, &next).await?;
            }
        }
    }
    Ok(())
}

async fn chat(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    context: SharedContext,
    tutor: Arc<Tutor>,
    config: Arc<Config>,
) -> HandlerResult {
    if msg.text() == Some(START_QUIZ_BUTTON) {
        return start_quiz(bot, dialogue, msg, context, config).await;
    }
    let Some(text) = msg.text().map(|t| t.trim().to_string()) else {
        bot.send_message(msg.chat.id, "Please write to me in text.")
            .await?;
        return Ok(());
    };

    let session = session_id(&msg);
    if let Err(err) = context.lock().await.record_chat_message(&session, Role::User, &text) {
        warn!("Couldn't log user message: {}", err);
    }

    typing(&bot, &msg).await;
    let reply = tutor.reply(&text).await;

    if let Err(err) = context.lock().await.record_chat_message(&session, Role::Assistant, &reply) {
        warn!("Couldn't log tutor reply: {}", err);
    }

    bot.send_message(msg.chat.id, reply)
        .reply_markup(menu_keyboard())
        .await?;
    Ok(())
}
