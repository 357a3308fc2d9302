use replicant::record::{MemoryStore, Record, StoredRecord};
use replicant::{
    attributes, AttributeValue, Attributes, DumpOptions, Dumper, Listener, Loader, LoaderConfig, RecordId,
    ReplicateError, Result, Stats, StreamReader, StreamWriter, TypeRegistry, UnresolvedPolicy,
};
use std::any::Any;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::rc::Rc;
use tempfile::tempdir;

/// Dump `roots` in order and return the encoded stream.
fn dump_to_bytes(roots: &[Rc<Record>], options: &DumpOptions) -> Result<Vec<u8>> {
    let writer = Rc::new(RefCell::new(StreamWriter::new(Vec::new())));
    let mut dumper = Dumper::new();
    dumper.listen_shared(writer.clone());
    dumper.dump_all(roots.iter().map(|r| Some(&**r)), options)?;
    dumper.complete()?;
    drop(dumper);

    let writer = Rc::try_unwrap(writer)
        .ok()
        .expect("dumper released the writer")
        .into_inner();
    Ok(writer.into_inner())
}

fn store_loader(store: &MemoryStore, config: LoaderConfig) -> Loader {
    let mut registry = TypeRegistry::new();
    registry.set_fallback(store.clone());
    Loader::with_config(registry, config)
}

#[test]
fn test_end_to_end_single_tuple() -> Result<()> {
    let object = Record::new("T", 1, attributes(vec![("name", "a")]));
    let bytes = dump_to_bytes(&[object], &DumpOptions::default())?;

    let tuples: Vec<_> = StreamReader::new(&bytes[..]).collect::<Result<_>>()?;
    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].type_name, "T");
    assert_eq!(tuples[0].id, RecordId::Int(1));
    assert_eq!(tuples[0].attributes, attributes(vec![("name", "a")]));

    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    assert_eq!(loader.read(&bytes[..])?, 1);

    let stored = store.records("T");
    assert_eq!(stored.len(), 1);
    assert_eq!(
        loader.keymap().resolve("T", &RecordId::Int(1)),
        Some(&stored[0].local_id)
    );
    assert_eq!(loader.stats().get("T"), 1);
    Ok(())
}

#[test]
fn test_reference_round_trip() -> Result<()> {
    let b = Record::new("B", 20, attributes(vec![("name", "b")]));
    let a = Record::new("A", 10, attributes(vec![("name", "a")]));
    a.belongs_to("b_id", &b);

    // Dumping A first still writes B before it.
    let bytes = dump_to_bytes(&[a, b], &DumpOptions::default())?;

    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    loader.read(&bytes[..])?;

    let loaded_b = &store.records("B")[0];
    let loaded_a = &store.records("A")[0];
    assert_eq!(
        loaded_a.attributes["b_id"],
        AttributeValue::from(loaded_b.local_id.clone())
    );
    assert_eq!(loader.unresolved(), 0);
    Ok(())
}

#[test]
fn test_list_reference_round_trip() -> Result<()> {
    let members: Vec<Rc<Record>> = (0..10)
        .map(|i| Record::new("Member", 100 + i, attributes(vec![("number", i)])))
        .collect();
    let group = Record::new("Group", 1, Attributes::new());
    group.references("member_ids", "Member", &members);

    let mut roots = members.clone();
    roots.push(group);
    let bytes = dump_to_bytes(&roots, &DumpOptions::default())?;

    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    assert_eq!(loader.read(&bytes[..])?, 11);

    let expected: Vec<AttributeValue> = store
        .records("Member")
        .into_iter()
        .map(|m| AttributeValue::from(m.local_id))
        .collect();
    assert_eq!(expected.len(), 10);
    let group = &store.records("Group")[0];
    assert_eq!(group.attributes["member_ids"], AttributeValue::List(expected));
    Ok(())
}

#[test]
fn test_mutual_references_dump_once_each() -> Result<()> {
    let user = Record::new("User", 1, attributes(vec![("login", "octocat")]));
    let profile = Record::new("Profile", 5, Attributes::new());
    profile.belongs_to("user_id", &user);
    user.has_one(&profile);
    user.set("profile_id", AttributeValue::reference("Profile", 5));

    let roots = [profile.clone(), user.clone(), profile, user];
    let bytes = dump_to_bytes(&roots, &DumpOptions::default())?;
    let tuples: Vec<_> = StreamReader::new(&bytes[..]).collect::<Result<_>>()?;
    let keys: Vec<String> = tuples.iter().map(|t| t.key().to_string()).collect();
    assert_eq!(keys, vec!["User:1", "Profile:5"]);

    // The user is written first, so its pointer to the profile is a
    // forward reference.
    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    loader.read(&bytes[..])?;
    assert_eq!(loader.unresolved(), 1);
    assert_eq!(store.records("User")[0].attributes["profile_id"], AttributeValue::Null);
    assert_eq!(
        store.records("Profile")[0].attributes["user_id"],
        AttributeValue::from(store.records("User")[0].local_id.clone())
    );
    Ok(())
}

#[test]
fn test_fail_policy_aborts_read() -> Result<()> {
    let bytes = {
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_tuple(
            "Issue",
            &RecordId::Int(1),
            &attributes(vec![("user_id", AttributeValue::reference("User", 42))]),
        )?;
        writer.into_inner()
    };

    let store = MemoryStore::new();
    let config = LoaderConfig {
        on_unresolved_reference: UnresolvedPolicy::Fail,
    };
    let mut loader = store_loader(&store, config);
    let result = loader.read(&bytes[..]);
    assert!(matches!(result, Err(ReplicateError::UnresolvedReference { .. })));
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn test_supertype_alias_resolves_references() -> Result<()> {
    let mut writer = StreamWriter::new(Vec::new());
    writer.write_tuple("Admin", &RecordId::Int(7), &attributes(vec![("login", "root")]))?;
    writer.write_tuple(
        "Repository",
        &RecordId::Int(1),
        &attributes(vec![("owner_id", AttributeValue::reference("User", 7))]),
    )?;
    let bytes = writer.into_inner();

    let store = MemoryStore::new();
    let mut registry = TypeRegistry::new();
    registry.register_with_aliases("Admin", vec!["User"], store.clone());
    registry.register("Repository", store.clone());
    let mut loader = Loader::new(registry);
    loader.read(&bytes[..])?;

    let admin = &store.records("Admin")[0];
    let repo = &store.records("Repository")[0];
    assert_eq!(
        repo.attributes["owner_id"],
        AttributeValue::from(admin.local_id.clone())
    );
    Ok(())
}

#[test]
fn test_loader_listeners_see_loaded_instances() -> Result<()> {
    struct Collect(Vec<StoredRecord>, usize);

    impl Listener for Collect {
        fn on_tuple(
            &mut self,
            _type_name: &str,
            _id: &RecordId,
            _attributes: &mut Attributes,
            object: &dyn Any,
        ) -> Result<()> {
            if let Some(record) = object.downcast_ref::<StoredRecord>() {
                self.0.push(record.clone());
            }
            Ok(())
        }

        fn on_complete(&mut self, stats: &Stats) -> Result<()> {
            self.1 = stats.total();
            Ok(())
        }
    }

    let users: Vec<Rc<Record>> = (1..=3)
        .map(|i| Record::new("User", i, attributes(vec![("login", format!("user{}", i))])))
        .collect();
    let bytes = dump_to_bytes(&users, &DumpOptions::default())?;

    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    let collect = Rc::new(RefCell::new(Collect(Vec::new(), 0)));
    loader.listen_shared(collect.clone());
    loader.read(&bytes[..])?;
    loader.complete()?;

    let collect = collect.borrow();
    let logins: Vec<String> = collect
        .0
        .iter()
        .filter_map(|r| r.attributes["login"].as_str().map(str::to_string))
        .collect();
    assert_eq!(logins, vec!["user1", "user2", "user3"]);
    assert_eq!(collect.1, 3);
    Ok(())
}

#[test]
fn test_stream_through_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("dump.replicant");

    let repo = Record::new("Repository", 1, attributes(vec![("name", "hello")]));
    let issues: Vec<Rc<Record>> = (1..=5)
        .map(|i| Record::new("Issue", i, attributes(vec![("number", i)])))
        .collect();
    for issue in &issues {
        issue.belongs_to("repository_id", &repo);
    }
    repo.has_many("issues", &issues);

    {
        let file = BufWriter::new(File::create(&path)?);
        let mut dumper = Dumper::new();
        dumper.listen(StreamWriter::new(file));
        dumper.dump(&*repo, &DumpOptions::new().with_association("issues"))?;
        assert_eq!(dumper.stats().total(), 6);
        dumper.complete()?;
    }

    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    let count = loader.read(BufReader::new(File::open(&path)?))?;
    assert_eq!(count, 6);

    let repo_id = AttributeValue::from(store.records("Repository")[0].local_id.clone());
    for issue in store.records("Issue") {
        assert_eq!(issue.attributes["repository_id"], repo_id);
    }
    Ok(())
}

#[test]
fn test_truncated_stream_fails_after_loading_complete_frames() -> Result<()> {
    let users: Vec<Rc<Record>> = (1..=2)
        .map(|i| Record::new("User", i, attributes(vec![("login", "someone")])))
        .collect();
    let mut bytes = dump_to_bytes(&users, &DumpOptions::default())?;
    bytes.pop();

    let store = MemoryStore::new();
    let mut loader = store_loader(&store, LoaderConfig::default());
    let result = loader.read(&bytes[..]);
    assert!(matches!(result, Err(ReplicateError::Truncated { .. })));
    assert_eq!(store.len(), 1);
    Ok(())
}
