mod common;

use std::sync::Arc;

use bson::{Bson, doc};
use docket_client::{
    ClientError, ClientFactory, Database, DocumentClient, LocalClient, LocalFactory, RemoteClient,
    RemoteFactory,
};
use docket_store::{ErrorCode, MemoryStore};

fn crud_roundtrip<C: DocumentClient>(client: &C) {
    let db = Database::new(client, "test");
    let t = db.get_collection("basic1");
    t.drop().unwrap();
    t.drop().unwrap();
    assert!(t.find_one(None).unwrap().is_none());

    let inserted = t.insert_one(doc! { "a": 1 }).unwrap();
    let found = t.find_one(None).unwrap().unwrap();
    assert_eq!(found.get_i32("a").unwrap(), 1);
    assert_eq!(found.get("_id"), Some(&inserted.inserted_id));

    let result = t
        .update_one(&doc! { "a": 1 }, &doc! { "$set": { "a": 2 } })
        .unwrap();
    assert_eq!(result.matched_count, 1);
    assert_eq!(result.modified_count, 1);
    assert_eq!(t.find_one(None).unwrap().unwrap().get_i32("a").unwrap(), 2);

    let missed = t
        .update_one(&doc! { "a": 99 }, &doc! { "$set": { "a": 3 } })
        .unwrap();
    assert_eq!(missed.matched_count, 0);
    assert_eq!(missed.modified_count, 0);

    t.replace_one(&doc! {}, doc! { "b": "x" }).unwrap();
    let replaced = t.find_one(None).unwrap().unwrap();
    assert_eq!(replaced.get("_id"), Some(&inserted.inserted_id));
    assert!(replaced.get("a").is_none());

    assert_eq!(t.count_documents(None).unwrap(), 1);
    assert_eq!(db.list_collections().unwrap(), vec!["basic1".to_string()]);
    assert!(db.current_op().unwrap().to_document().get_array("inprog").is_ok());

    assert_eq!(db.drop_database().unwrap(), 1);
    assert!(t.find(None).unwrap().is_empty());
}

fn duplicate_id_is_store_error<C: DocumentClient>(client: &C) {
    let t = Database::new(client, "test").get_collection("dups");
    t.insert_one(doc! { "_id": 7, "a": 1 }).unwrap();
    match t.insert_one(doc! { "_id": 7, "a": 2 }) {
        Err(ClientError::Store(e)) => assert_eq!(e.code(), ErrorCode::DuplicateKey),
        other => panic!("expected duplicate key error, got {other:?}"),
    }
}

fn malformed_filter_is_store_error<C: DocumentClient>(client: &C) {
    let t = Database::new(client, "test").get_collection("filters");
    let err = t.find_one(Some(&doc! { "a": { "$nope": 1 } })).unwrap_err();
    assert!(err.is_store_error());
}

#[test]
fn local_client_crud() {
    let client = LocalClient::new(Arc::new(MemoryStore::new()));
    crud_roundtrip(&client);
    duplicate_id_is_store_error(&client);
    malformed_filter_is_store_error(&client);
}

#[test]
fn remote_client_crud() {
    let server = common::start_server();
    let client = RemoteClient::connect(server.addr.as_str()).unwrap();
    crud_roundtrip(&client);
    duplicate_id_is_store_error(&client);
    malformed_filter_is_store_error(&client);
}

#[test]
fn remote_ids_survive_the_wire() {
    let server = common::start_server();
    let client = RemoteClient::connect(server.addr.as_str()).unwrap();
    let t = Database::new(&client, "test").get_collection("ids");
    let inserted = t.insert_one(doc! { "a": 1 }).unwrap();
    assert!(matches!(inserted.inserted_id, Bson::ObjectId(_)));

    let found = t
        .find_one(Some(&doc! { "_id": inserted.inserted_id.clone() }))
        .unwrap()
        .unwrap();
    assert_eq!(found.get_i32("a").unwrap(), 1);
}

#[test]
fn local_factory_clients_share_a_store() {
    let factory = LocalFactory::default();
    let a = factory.connect().unwrap();
    let b = factory.connect().unwrap();
    Database::new(&a, "shared")
        .get_collection("c")
        .insert_one(doc! { "x": 1 })
        .unwrap();
    let seen = Database::new(&b, "shared").get_collection("c").count_documents(None).unwrap();
    assert_eq!(seen, 1);
}

#[test]
fn remote_factory_connects_per_call() {
    let server = common::start_server();
    let factory = RemoteFactory::new(server.addr.clone(), None);
    let a = factory.connect().unwrap();
    let b = factory.connect().unwrap();
    Database::new(&a, "shared")
        .get_collection("c")
        .insert_one(doc! { "x": 1 })
        .unwrap();
    let seen = Database::new(&b, "shared").get_collection("c").count_documents(None).unwrap();
    assert_eq!(seen, 1);
}

#[test]
fn connect_to_closed_port_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    match RemoteClient::connect(addr) {
        Err(ClientError::Transport(_)) => {}
        Err(other) => panic!("expected transport error, got {other}"),
        Ok(_) => panic!("expected connection to fail"),
    }
}
