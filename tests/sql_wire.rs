use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use innkeep::engine::Engine;
use innkeep::notify::InvalidationHub;
use innkeep::wire;

async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("innkeep_sql_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let engine =
        Arc::new(Engine::new(dir.join("innkeep.wal"), Arc::new(InvalidationHub::new())).unwrap());

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let engine = engine.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine, "innkeep".to_string(), None).await;
            });
        }
    });
    addr
}

async fn connect_with(addr: SocketAddr, password: &str) -> Result<Client, tokio_postgres::Error> {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("hotel")
        .user("innkeep")
        .password(password);
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(client)
}

async fn connect(addr: SocketAddr) -> Client {
    connect_with(addr, "innkeep").await.unwrap()
}

async fn rows(client: &Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn sqlstate(client: &Client, sql: &str) -> String {
    let err = client.batch_execute(sql).await.unwrap_err();
    err.code().map(|c| c.code().to_string()).unwrap_or_default()
}

async fn create_room(client: &Client, number: &str, capacity: u32) -> Ulid {
    let id = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO rooms (id, number, room_type, price, capacity, status, amenities) \
             VALUES ('{id}', '{number}', 'DOUBLE', 120.00, {capacity}, 'AVAILABLE', 'wifi,minibar')"
        ))
        .await
        .unwrap();
    id
}

fn insert_booking(id: Ulid, room: Ulid, check_in: &str, check_out: &str) -> String {
    format!(
        "INSERT INTO bookings (id, room_id, guest_id, check_in, check_out, guests, total_price) \
         VALUES ('{id}', '{room}', '{}', '{check_in}', '{check_out}', 2, 500.00)",
        Ulid::new()
    )
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let addr = start_test_server().await;
    assert!(connect_with(addr, "wrong").await.is_err());
}

#[tokio::test]
async fn rooms_round_trip() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;

    let found = rows(&client, &format!("SELECT * FROM rooms WHERE id = '{room}'")).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("number"), Some("101"));
    assert_eq!(found[0].get("price"), Some("120.00"));
    assert_eq!(found[0].get("amenities"), Some("wifi,minibar"));
    assert_eq!(found[0].get("description"), None);

    assert_eq!(
        sqlstate(
            &client,
            &format!(
                "INSERT INTO rooms (id, number, room_type, price, capacity) VALUES ('{}', '101', 'SINGLE', 80, 1)",
                Ulid::new()
            )
        )
        .await,
        "23505"
    );
}

#[tokio::test]
async fn booking_scenario_r101() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;
    client
        .batch_execute(&insert_booking(Ulid::new(), room, "2024-06-01", "2024-06-05"))
        .await
        .unwrap();

    let adjacent = rows(
        &client,
        "SELECT * FROM availability WHERE check_in = '2024-06-05' AND check_out = '2024-06-08'",
    )
    .await;
    assert_eq!(adjacent.len(), 1);
    assert_eq!(adjacent[0].get("id"), Some(room.to_string().as_str()));

    let overlapping = rows(
        &client,
        "SELECT * FROM availability WHERE check_in = '2024-06-04' AND check_out = '2024-06-06'",
    )
    .await;
    assert!(overlapping.is_empty());

    assert_eq!(
        sqlstate(&client, &insert_booking(Ulid::new(), room, "2024-06-04", "2024-06-06")).await,
        "23P01"
    );
}

#[tokio::test]
async fn lifecycle_over_sql() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;
    let id = Ulid::new();
    client
        .batch_execute(&insert_booking(id, room, "2024-06-01", "2024-06-05"))
        .await
        .unwrap();

    for status in ["CONFIRMED", "CHECKED_IN"] {
        client
            .batch_execute(&format!("UPDATE bookings SET status = '{status}' WHERE id = '{id}'"))
            .await
            .unwrap();
    }
    assert_eq!(
        sqlstate(&client, &format!("DELETE FROM bookings WHERE id = '{id}'")).await,
        "P0001"
    );

    let found = rows(&client, &format!("SELECT * FROM bookings WHERE id = '{id}'")).await;
    assert_eq!(found[0].get("status"), Some("CHECKED_IN"));
    assert_eq!(found[0].get("check_in"), Some("2024-06-01"));

    assert_eq!(
        sqlstate(&client, &format!("DELETE FROM rooms WHERE id = '{room}'")).await,
        "P0001"
    );
}

#[tokio::test]
async fn full_update_requires_every_column() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;
    let id = Ulid::new();
    client
        .batch_execute(&insert_booking(id, room, "2024-06-01", "2024-06-05"))
        .await
        .unwrap();

    assert_eq!(
        sqlstate(
            &client,
            &format!("UPDATE bookings SET guests = 1, total_price = 100 WHERE id = '{id}'")
        )
        .await,
        "23502"
    );

    client
        .batch_execute(&format!(
            "UPDATE bookings SET room_id = '{room}', check_in = '2024-06-02', check_out = '2024-06-06', \
             guests = 1, status = 'CONFIRMED', total_price = 400 WHERE id = '{id}'"
        ))
        .await
        .unwrap();
    let found = rows(&client, &format!("SELECT * FROM bookings WHERE id = '{id}'")).await;
    assert_eq!(found[0].get("check_out"), Some("2024-06-06"));
    assert_eq!(found[0].get("status"), Some("CONFIRMED"));
    assert_eq!(found[0].get("total_price"), Some("400"));
}

#[tokio::test]
async fn payments_and_balance_over_sql() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;
    let booking = Ulid::new();
    client
        .batch_execute(&insert_booking(booking, room, "2024-06-01", "2024-06-05"))
        .await
        .unwrap();

    let first = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO payments (id, booking_id, amount, method) VALUES ('{first}', '{booking}', 300.00, 'CARD'); \
             UPDATE payments SET status = 'COMPLETED' WHERE id = '{first}'"
        ))
        .await
        .unwrap();

    assert_eq!(
        sqlstate(
            &client,
            &format!(
                "INSERT INTO payments (id, booking_id, amount, method) VALUES ('{}', '{booking}', 250.00, 'CASH')",
                Ulid::new()
            )
        )
        .await,
        "P0001"
    );

    let balance = rows(&client, &format!("SELECT * FROM balance WHERE booking_id = '{booking}'")).await;
    assert_eq!(balance[0].get("total_paid"), Some("300.00"));
    assert_eq!(balance[0].get("remaining"), Some("200.00"));

    let payments =
        rows(&client, &format!("SELECT * FROM payments WHERE booking_id = '{booking}'")).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].get("status"), Some("COMPLETED"));
}

#[tokio::test]
async fn sqlstates_for_bad_input() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;

    assert_eq!(sqlstate(&client, "SELEKT nonsense").await, "42601");
    assert_eq!(sqlstate(&client, "SELECT * FROM guests").await, "42601");
    assert_eq!(
        sqlstate(&client, &insert_booking(Ulid::new(), room, "2024-06-05", "2024-06-01")).await,
        "22023"
    );
    assert_eq!(
        sqlstate(
            &client,
            &format!("UPDATE bookings SET status = 'CONFIRMED' WHERE id = '{}'", Ulid::new())
        )
        .await,
        "P0002"
    );
}

#[tokio::test]
async fn extended_protocol_binds_text_params() {
    let addr = start_test_server().await;
    let client = connect(addr).await;
    let room = create_room(&client, "101", 2).await;
    let id = Ulid::new();
    client
        .batch_execute(&insert_booking(id, room, "2024-06-01", "2024-06-05"))
        .await
        .unwrap();

    let id_text = id.to_string();
    let updated = client
        .execute(
            "UPDATE bookings SET status = $1 WHERE id = $2",
            &[&"CONFIRMED", &id_text],
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let found = client
        .query("SELECT * FROM bookings WHERE id = $1", &[&id_text])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let status: &str = found[0].get("status");
    assert_eq!(status, "CONFIRMED");
}
