//! Uneven split example.
//!
//! Rank 0 holds `10 * size + 3` values and splits them with
//! `scatter_equally`: every rank gets 10, rank 0 also the 3 left over. Each
//! rank doubles its share and `gather_equally` puts the array back together.
//! The text variants are then checked against the typed ones.
//!
//! A custom panic hook calls `std::process::abort()` to prevent MPI hangs.
//!
//! Run with: mpiexec -n 4 cargo run --example scatter_equally

use macrompi::{decode, encode, Communicator, Config, Partition};

fn main() {
    let config = Config::from_env();
    let mut world = Communicator::discover(&config).expect("no MPI runtime found");
    world
        .initialise(&config.init_args())
        .expect("MPI init failed");

    // Installed after init so the runtime keeps its own handlers.
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        std::process::abort();
    }));

    let rank = world.rank().unwrap();
    let size = world.size().unwrap() as usize;
    let total = 10 * size + 3;

    // ============================================================
    // Typed buffers
    // ============================================================
    {
        let data: Vec<f64> = if rank == 0 {
            (0..total).map(|i| i as f64).collect()
        } else {
            Vec::new()
        };

        let mine = world.scatter_equally(&data, total, 0).unwrap();
        let expected = Partition::new(total, size, rank as usize).unwrap();
        assert_eq!(mine.len(), expected.receive_count);
        println!("Rank {}: received {} values", rank, mine.len());

        let doubled: Vec<f64> = mine.iter().map(|x| x * 2.0).collect();
        let back = world.gather_equally(&doubled, total, 0).unwrap();

        if rank == 0 {
            assert_eq!(back.len(), total);
            for (i, x) in back.iter().enumerate() {
                assert_eq!(*x, i as f64 * 2.0, "mismatch at {i}");
            }
            println!("  scatter_equally/gather_equally passed ({total} values)");
        } else {
            assert!(back.is_empty());
        }
    }

    world.barrier().unwrap();

    // ============================================================
    // Text buffers
    // ============================================================
    {
        let text = if rank == 0 {
            encode(&(0..total).map(|i| i as f64 * 0.5).collect::<Vec<_>>())
        } else {
            String::new()
        };

        let mine = world.scatter_equally_text(&text, total, 0).unwrap();
        let values = decode(&mine).unwrap();
        let expected = Partition::new(total, size, rank as usize).unwrap();
        assert_eq!(values.len(), expected.receive_count);

        let back = world.gather_equally_text(&mine, total, 0).unwrap();
        if rank == 0 {
            assert_eq!(back, text);
            println!("  text round trip passed");
        }
    }

    world.barrier().unwrap();
    if rank == 0 {
        println!("\nAll scatter_equally checks passed!");
    }

    world.finalise().unwrap();
}
