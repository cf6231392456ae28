//! Shared fixtures for robobot integration tests.
//!
//! Response bodies follow the Robot web service documentation samples.

#![forbid(unsafe_code)]

use serde_json::{Value, json};
use wiremock::matchers::{basic_auth, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ROBOT_USER: &str = "#ws+test";
pub const ROBOT_PASSWORD: &str = "hunter2";

/// One `GET /server` array element.
pub fn server_json(ip: &str, number: u64, name: &str) -> Value {
    json!({
        "server": {
            "server_ip": ip,
            "server_number": number,
            "server_name": name,
            "product": "EX 10",
            "dc": "FSN1-DC14",
            "traffic": "5 TB",
            "flatrate": true,
            "status": "ready",
            "throttled": false,
            "cancelled": false,
            "paid_until": "2031-09-02",
            "ip": [ip],
            "subnet": [{"ip": "2a01:4f8:111:4221::", "mask": "64"}]
        }
    })
}

/// `GET /reset/{ip}` body.
pub fn reset_options_json(ip: &str, types: &[&str]) -> Value {
    json!({
        "reset": {
            "server_ip": ip,
            "server_number": 321,
            "type": types,
            "operating_status": "not supported"
        }
    })
}

/// `POST /reset/{ip}` body.
pub fn reset_json(ip: &str, reset_type: &str) -> Value {
    json!({"reset": {"server_ip": ip, "type": reset_type}})
}

/// Mount `GET /server` returning `servers`.
pub async fn mount_server_list(server: &MockServer, servers: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/server"))
        .and(basic_auth(ROBOT_USER, ROBOT_PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(servers)))
        .mount(server)
        .await;
}

/// Mount `GET /reset/{ip}`, expecting exactly `times` calls.
pub async fn mount_reset_options(server: &MockServer, ip: &str, types: &[&str], times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/reset/{ip}")))
        .and(basic_auth(ROBOT_USER, ROBOT_PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_json(reset_options_json(ip, types)))
        .expect(times)
        .mount(server)
        .await;
}

/// Mount `POST /reset/{ip}` for `type=<reset_type>`, expecting exactly `times` calls.
pub async fn mount_reset(server: &MockServer, ip: &str, reset_type: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/reset/{ip}")))
        .and(basic_auth(ROBOT_USER, ROBOT_PASSWORD))
        .and(body_string(format!("type={reset_type}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(reset_json(ip, reset_type)))
        .expect(times)
        .mount(server)
        .await;
}

/// Telegram `getUpdates` result element carrying a text message.
pub fn telegram_text_update(update_id: i64, chat_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1_700_000_000,
            "chat": {"id": chat_id, "type": "private"},
            "from": {"id": chat_id, "is_bot": false, "first_name": "Operator"},
            "text": text
        }
    })
}
