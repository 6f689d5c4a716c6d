/// Deserialization tests for Bot API payloads in the shapes Telegram sends.
#[cfg(test)]
mod unit {
    use crate::types::{ApiResponse, ReplyMarkup, SendMessage, Update};

    fn parse_update(json: &str) -> Update {
        serde_json::from_str(json).expect("failed to parse update")
    }

    #[test]
    fn parse_command_message() {
        let update = parse_update(
            r#"{
            "update_id": 100,
            "message": {
                "message_id": 5,
                "from": {"id": 77, "is_bot": false, "first_name": "Ann", "username": "ann"},
                "chat": {"id": 77, "type": "private"},
                "date": 1700000000,
                "text": "/start",
                "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
            }
        }"#,
        );
        let msg = update.message.unwrap();
        assert_eq!(msg.command(), Some("start"));
        assert_eq!(msg.from.unwrap().first_name, "Ann");
    }

    #[test]
    fn command_strips_bot_name() {
        let update = parse_update(
            r#"{
            "update_id": 1,
            "message": {
                "message_id": 2,
                "chat": {"id": -100, "type": "group"},
                "text": "/create@lunch_bot Acme 12:30",
                "entities": [{"type": "bot_command", "offset": 0, "length": 17}]
            }
        }"#,
        );
        let msg = update.message.unwrap();
        assert_eq!(msg.command(), Some("create"));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        let update = parse_update(
            r#"{"update_id": 1, "message": {"message_id": 2, "chat": {"id": 1}, "text": "Soups"}}"#,
        );
        let msg = update.message.unwrap();
        assert!(msg.command().is_none());
    }

    #[test]
    fn slash_text_without_entity_is_not_a_command() {
        let update = parse_update(
            r#"{"update_id": 1, "message": {"message_id": 2, "chat": {"id": 1}, "text": "/menu"}}"#,
        );
        assert!(update.message.unwrap().command().is_none());
    }

    #[test]
    fn non_message_update_has_no_message() {
        let update = parse_update(
            r#"{"update_id": 9, "edited_message": {"message_id": 2, "chat": {"id": 1}}}"#,
        );
        assert!(update.message.is_none());
    }

    #[test]
    fn error_envelope_without_result() {
        let resp: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok": false, "error_code": 409, "description": "Conflict"}"#,
        )
        .unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.error_code, Some(409));
    }

    #[test]
    fn send_message_omits_absent_markup() {
        let json = serde_json::to_value(SendMessage::new(1, "x")).unwrap();
        assert!(json.get("reply_markup").is_none());

        let json =
            serde_json::to_value(SendMessage::new(1, "x").with_markup(ReplyMarkup::remove()))
                .unwrap();
        assert_eq!(json["reply_markup"]["remove_keyboard"], true);
    }
}
