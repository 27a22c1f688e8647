mod buffer_pool;
mod db;
mod disk_manager;
mod errors;
mod index;
mod model;
mod pages;

use anyhow::Result;

use db::Database;
use model::{Course, SensorData, User};

#[macro_export]
macro_rules! printdbg {
    ($val: expr $(, $args: expr)*) => {
        #[cfg(debug_assertions)]
        println!($val $(, $args)*)
    };
}

fn main() -> Result<()> {
    let path = "data/lumina.db";
    let mut db = Database::open(path, 32)?;

    db.insert(1, &User::new(1, "Ada Lovelace", 36))?;
    db.insert(2, &User::new(2, "Grace Hopper", 85))?;
    db.insert(10, &SensorData::new(10, 21.5, 1_700_000_000))?;
    db.insert(100, &Course::new(100, "Databases", vec![1, 2]))?;

    println!("{:?}", db.find::<User>(1)?);
    println!("{:?}", db.find::<User>(2)?);
    println!("{:?}", db.find::<SensorData>(10)?);
    println!("{:?}", db.find::<Course>(100)?);

    println!("exists(1) = {}", db.exists(1)?);
    println!("exists(999) = {}", db.exists(999)?);

    // `find_any` doesn't need to be told a key's type ahead of time — it
    // dispatches on the record's own stored `object_type` tag, the same way
    // `ModelFactory::create` does in the original.
    for key in [1, 10, 100] {
        println!("find_any({key}) = {:?}", db.find_any(key)?);
    }

    // A duplicate key is rejected without disturbing the stored value.
    let reinserted = db.insert(1, &User::new(1, "Someone Else", 0))?;
    println!("reinsert of key 1 accepted = {reinserted}");

    drop(db);

    // Reopening the same file recovers the B+Tree root from page 0 and
    // every record written above.
    let db = Database::open(path, 32)?;
    println!("after reopen: {:?}", db.find::<User>(1)?);

    Ok(())
}
