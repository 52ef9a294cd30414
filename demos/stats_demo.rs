use clap::Parser;
use clap::ValueEnum;
use probe_table::HashTable;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyShape {
    /// Sequential `u64` keys.
    Sequential,
    /// Random `u64` keys.
    Random,
    /// `(x, y)` coordinates of a square grid.
    Grid,
    /// Formatted string keys.
    Strings,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'k', long = "keys", value_enum, default_value_t = KeyShape::Random)]
    keys: KeyShape,
}

fn report<K, V>(table: &HashTable<K, V>, hint: usize) {
    println!("Inserted {} values into table", table.len());
    println!(
        "Final capacity: {} (grew {}x from hint {})",
        table.capacity(),
        table.capacity() / hint.max(1).next_power_of_two(),
        hint
    );
    println!(
        "Final load factor: {:.2}%",
        (table.len() as f64 / table.capacity() as f64) * 100.0
    );

    table.probe_histogram().print();
    table.debug_stats().print();
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let count = args.target_capacity;
    match args.keys {
        KeyShape::Sequential => {
            let mut table = HashTable::with_capacity(args.target_capacity);
            for i in 0..count as u64 {
                table.insert(i, i);
            }
            report(&table, args.target_capacity);
        }
        KeyShape::Random => {
            let mut table = HashTable::with_capacity(args.target_capacity);
            let mut rng = SmallRng::from_os_rng();
            for i in 0..count as u64 {
                table.insert(rng.random::<u64>(), i);
            }
            report(&table, args.target_capacity);
        }
        KeyShape::Grid => {
            let side = (count as f64).sqrt().ceil() as i32;
            let mut table = HashTable::with_capacity(args.target_capacity);
            for x in 0..side {
                for y in 0..side {
                    table.insert((x, y), x ^ y);
                }
            }
            report(&table, args.target_capacity);
        }
        KeyShape::Strings => {
            let mut table = HashTable::with_capacity(args.target_capacity);
            for i in 0..count {
                table.insert(format!("key_{i:08}"), i);
            }
            report(&table, args.target_capacity);
        }
    }
}
