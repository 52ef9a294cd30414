use std::collections::VecDeque;

use clap::Parser;
use probe_table::HashSet;
use probe_table::HashTable;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'w', long = "width", default_value_t = 48)]
    width: i32,

    #[arg(short = 'H', long = "height", default_value_t = 20)]
    height: i32,

    /// Chance that a tile is a wall.
    #[arg(short = 'd', long = "density", default_value_t = 0.28)]
    density: f64,

    #[arg(short = 's', long = "seed", default_value_t = 7)]
    seed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tile {
    Floor,
    Wall,
}

type Point = (i32, i32);

const STEPS: [Point; 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Sparse map: only tiles that were generated are stored.
fn generate(args: &Args) -> HashTable<Point, Tile> {
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut tiles = HashTable::new();
    for y in 0..args.height {
        for x in 0..args.width {
            let tile = if rng.random_bool(args.density) {
                Tile::Wall
            } else {
                Tile::Floor
            };
            tiles.insert((x, y), tile);
        }
    }

    tiles.insert((0, 0), Tile::Floor);
    tiles.insert((args.width - 1, args.height - 1), Tile::Floor);
    tiles
}

/// Breadth-first search returning the step cost of every reachable tile and
/// the predecessor links used to rebuild paths.
fn flood(
    tiles: &HashTable<Point, Tile>,
    start: Point,
) -> (HashTable<Point, u32>, HashTable<Point, Point>) {
    let mut costs = HashTable::new();
    let mut came_from = HashTable::new();
    let mut visited = HashSet::new();
    let mut frontier = VecDeque::new();

    visited.insert(start);
    costs.insert(start, 0);
    frontier.push_back(start);

    while let Some(current) = frontier.pop_front() {
        let cost = costs.find(&current).copied().unwrap_or(0);
        for (dx, dy) in STEPS {
            let next = (current.0 + dx, current.1 + dy);
            if tiles.find(&next) != Some(&Tile::Floor) || !visited.insert(next) {
                continue;
            }

            costs.insert(next, cost + 1);
            came_from.insert(next, current);
            frontier.push_back(next);
        }
    }

    (costs, came_from)
}

fn path_to(came_from: &HashTable<Point, Point>, start: Point, goal: Point) -> Vec<Point> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.find(&current) {
            Some(&previous) => {
                path.push(previous);
                current = previous;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

fn main() {
    let args = Args::parse();
    let tiles = generate(&args);
    let start = (0, 0);
    let goal = (args.width - 1, args.height - 1);

    let (costs, came_from) = flood(&tiles, start);
    let path = path_to(&came_from, start, goal);
    let on_path: HashSet<Point> = path.iter().copied().collect();

    for y in 0..args.height {
        let row: String = (0..args.width)
            .map(|x| match tiles.find(&(x, y)) {
                Some(Tile::Wall) => '#',
                Some(Tile::Floor) if on_path.contains(&(x, y)) => '*',
                Some(Tile::Floor) if costs.contains_key(&(x, y)) => '.',
                Some(Tile::Floor) => ' ',
                None => '?',
            })
            .collect();
        println!("{row}");
    }

    println!();
    println!(
        "tiles: {} (capacity {}, probe window {})",
        tiles.len(),
        tiles.capacity(),
        tiles.max_probe_length()
    );
    println!("reachable: {}", costs.len());
    match costs.find(&goal) {
        Some(cost) => println!("path length: {cost} steps"),
        None => println!("goal {goal:?} is unreachable"),
    }
}
