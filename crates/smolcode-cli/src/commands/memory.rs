use clap::Subcommand;

use smolcode_memory::MemoryStore;

#[derive(Debug, Subcommand)]
pub enum MemoryCmd {
    /// Store a fact, replacing any existing fact with the same id.
    Add { id: String, content: String },
    /// Print a fact by id.
    Get { id: String },
    /// Full-text search across facts.
    Search { query: String },
    /// Delete facts by id.
    Forget { ids: Vec<String> },
}

pub fn run(cmd: MemoryCmd, store: &MemoryStore) -> anyhow::Result<()> {
    match cmd {
        MemoryCmd::Add { id, content } => {
            store.add(&id, &content)?;
            println!("stored {id}");
        }
        MemoryCmd::Get { id } => {
            let memory = store.get(&id)?;
            println!("{}", memory.content);
        }
        MemoryCmd::Search { query } => {
            for memory in store.search(&query)? {
                println!("{}: {}", memory.id, memory.content);
            }
        }
        MemoryCmd::Forget { ids } => {
            for id in ids {
                match store.forget(&id) {
                    Ok(()) => println!("forgot {id}"),
                    Err(e) => println!("{id}: {e}"),
                }
            }
        }
    }
    Ok(())
}
