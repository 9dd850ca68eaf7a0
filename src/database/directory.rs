use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::status::VoterClassification;
use crate::domain::{Customer, Reservation, Restaurant};
use crate::errors::{EngineError, Result};

use super::parse_enum;

pub fn insert_restaurant(
    conn: &Connection,
    name: &str,
    city: &str,
    cuisine: &str,
) -> Result<Restaurant> {
    let sql = "INSERT INTO restaurants (name, city, cuisine) VALUES (?1, ?2, ?3) RETURNING id, name, city, cuisine";

    let restaurant = conn.query_row(sql, params![name, city, cuisine], parse_restaurant_row)?;
    Ok(restaurant)
}

pub fn get_restaurant(conn: &Connection, id: i64) -> Result<Restaurant> {
    let sql = "SELECT id, name, city, cuisine FROM restaurants WHERE id = ?1";

    conn.query_row(sql, params![id], parse_restaurant_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("restaurant", id))
}

fn parse_restaurant_row(row: &rusqlite::Row) -> rusqlite::Result<Restaurant> {
    Ok(Restaurant {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        cuisine: row.get(3)?,
    })
}

pub fn insert_customer(
    conn: &Connection,
    name: &str,
    classification: VoterClassification,
) -> Result<Customer> {
    let sql = "INSERT INTO customers (name, classification) VALUES (?1, ?2) RETURNING id, name, classification";

    let customer = conn.query_row(sql, params![name, classification.as_str()], parse_customer_row)?;
    Ok(customer)
}

pub fn get_customer(conn: &Connection, id: i64) -> Result<Customer> {
    let sql = "SELECT id, name, classification FROM customers WHERE id = ?1";

    conn.query_row(sql, params![id], parse_customer_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("customer", id))
}

fn parse_customer_row(row: &rusqlite::Row) -> rusqlite::Result<Customer> {
    let raw: String = row.get(2)?;
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        classification: parse_enum(2, &raw, VoterClassification::parse)?,
    })
}

pub fn insert_reservation(
    conn: &Connection,
    customer_id: i64,
    restaurant_id: i64,
    seated: bool,
    visited_at: DateTime<Utc>,
) -> Result<Reservation> {
    let sql = "INSERT INTO reservations (customer_id, restaurant_id, seated, visited_at) VALUES (?1, ?2, ?3, ?4) RETURNING id, customer_id, restaurant_id, seated, visited_at";

    let reservation = conn.query_row(
        sql,
        params![customer_id, restaurant_id, seated, visited_at],
        parse_reservation_row,
    )?;
    Ok(reservation)
}

pub fn get_reservation(conn: &Connection, id: i64) -> Result<Reservation> {
    let sql = "SELECT id, customer_id, restaurant_id, seated, visited_at FROM reservations WHERE id = ?1";

    conn.query_row(sql, params![id], parse_reservation_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("reservation", id))
}

pub fn count_seated_reservations(conn: &Connection, restaurant_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reservations WHERE restaurant_id = ?1 AND seated = 1",
        params![restaurant_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_reservation_row(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        restaurant_id: row.get(2)?,
        seated: row.get(3)?,
        visited_at: row.get(4)?,
    })
}
