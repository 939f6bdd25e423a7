use probemap::{HashedDictionary, Native, Str, TableConfig};
use tempfile::tempdir;

fn main() -> probemap::Result<()> {
    env_logger::init();

    let config = TableConfig::default().with_initial_capacity(11);
    let mut dict: HashedDictionary<u64, String> = HashedDictionary::with_config(config)?;

    for k in 1..=7 {
        dict.add(k, format!("v{k}"));
    }
    dict.remove(&3);
    dict.add(8, "v8".to_string());

    println!(
        "{} entries in {} slots ({} used, load factor {:.2})",
        dict.len(),
        dict.capacity(),
        dict.used_count(),
        dict.load_factor()
    );

    let mut keys: Vec<u64> = dict.keys().copied().collect();
    keys.sort_unstable();
    println!("keys: {keys:?}");

    let dir = tempdir()?;
    let path = dir.path().join("dict.snap");
    dict.write_snapshot::<Native<u64>, Str>(&path)?;
    println!("snapshot written to {}", path.display());

    let loaded: HashedDictionary<u64, String> =
        HashedDictionary::load_snapshot::<Native<u64>, Str>(&path)?;
    for k in keys {
        assert_eq!(loaded.get_value(&k), dict.get_value(&k));
    }
    println!("reloaded {} entries", loaded.len());

    Ok(())
}
