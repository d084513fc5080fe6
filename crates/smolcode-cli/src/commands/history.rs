use clap::Subcommand;

use smolcode_history::HistoryStore;

#[derive(Debug, Subcommand)]
pub enum HistoryCmd {
    /// Allocate a new empty conversation and print its id.
    New,
    /// List stored conversations.
    List,
    /// Print the messages of a conversation.
    Show { id: String },
    /// Append a user text message to a conversation.
    Append { id: String, text: String },
}

pub fn run(cmd: HistoryCmd, store: &HistoryStore) -> anyhow::Result<()> {
    match cmd {
        HistoryCmd::New => {
            let conversation = store.new_conversation();
            store.save(&conversation)?;
            println!("{}", conversation.id);
        }
        HistoryCmd::List => {
            for summary in store.list()? {
                println!(
                    "{}  {}  {} message(s)  last {}",
                    summary.id,
                    summary.created_at,
                    summary.message_count,
                    summary.latest_message_time.as_deref().unwrap_or("-"),
                );
            }
        }
        HistoryCmd::Show { id } => {
            let conversation = store.load(&id)?;
            for (i, message) in conversation.messages.iter().enumerate() {
                println!("[{i}] {}", serde_json::to_string(&message.payload)?);
            }
        }
        HistoryCmd::Append { id, text } => {
            store.append_user_text(&id, &text)?;
            println!("appended to {id}");
        }
    }
    Ok(())
}
