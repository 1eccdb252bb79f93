use std::hash::RandomState;

use chain_hash::End;
use chain_hash::HashTable;

use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Number of entries to insert. Defaults to the table's initial capacity.
    #[arg(short = 'n', long = "entries")]
    entries: Option<usize>,

    /// Erase every entry whose key is divisible by this value after filling.
    #[arg(short = 'e', long = "erase_every", default_value_t = 2)]
    erase_every: u64,
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64, u64, RandomState> =
        HashTable::with_capacity(args.target_capacity);
    let initial_capacity = table.capacity();

    println!("Actual capacity: {}", initial_capacity);
    println!("Filling table with u64 keys...");

    let num_values = args.entries.unwrap_or(initial_capacity);
    for i in 0..num_values {
        let key = i as u64;
        if !table.insert(key, key * key) {
            panic!("Key already exists in table: {}", key);
        }
    }

    println!(
        "Inserted {} entries, capacity grew from {} to {}",
        table.len(),
        initial_capacity,
        table.capacity()
    );
    table.stats().print();

    let mut erased = 0;
    if args.erase_every > 0 {
        let mut cursor = table.begin_mut();
        while cursor != End {
            if cursor.key().is_some_and(|k| k % args.erase_every == 0) {
                cursor.erase();
                erased += 1;
            } else {
                cursor.move_next();
            }
        }
    }

    println!("Erased {} entries while iterating", erased);
    table.stats().print();

    table.shrink();
    println!("After shrink: capacity {}", table.capacity());
    table.stats().print();
}
