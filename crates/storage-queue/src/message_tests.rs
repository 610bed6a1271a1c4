//! Tests for message types and identifiers.

use super::*;

mod queue_name {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(QueueName::new("orders".to_string()).is_ok());
        assert!(QueueName::new("abc".to_string()).is_ok());
        assert!(QueueName::new("order-events-2".to_string()).is_ok());
        assert!(QueueName::new("a".repeat(63)).is_ok());
    }

    #[test]
    fn test_length_limits() {
        assert!(QueueName::new("ab".to_string()).is_err());
        assert!(QueueName::new("a".repeat(64)).is_err());
        assert!(QueueName::new(String::new()).is_err());
    }

    #[test]
    fn test_character_rules() {
        assert!(QueueName::new("Orders".to_string()).is_err());
        assert!(QueueName::new("queue_123".to_string()).is_err());
        assert!(QueueName::new("special@chars".to_string()).is_err());
        assert!(QueueName::new("-leading".to_string()).is_err());
        assert!(QueueName::new("trailing-".to_string()).is_err());
        assert!(QueueName::new("double--hyphen".to_string()).is_err());
    }

    #[test]
    fn test_serde_validates_names() {
        let name: QueueName = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(name.as_str(), "orders");

        let invalid: Result<QueueName, _> = serde_json::from_str("\"NO\"");
        assert!(invalid.is_err());
    }
}

#[test]
fn test_message_id_generation() {
    let id1 = MessageId::new();
    let id2 = MessageId::new();
    assert_ne!(id1, id2);
    assert!(!id1.as_str().is_empty());
}

#[test]
fn test_empty_identifiers_rejected() {
    assert!("".parse::<MessageId>().is_err());
    assert!("".parse::<PopReceipt>().is_err());
    assert_eq!("AgAAAAMAAAA".parse::<PopReceipt>().unwrap().as_str(), "AgAAAAMAAAA");
}

#[test]
fn test_pop_receipts_are_unique() {
    assert_ne!(PopReceipt::new(), PopReceipt::new());
}

#[test]
fn test_timestamp_plus_and_ordering() {
    let start = Timestamp::now();
    let later = start.plus(Duration::seconds(30));

    assert!(later > start);
    assert_eq!(later.as_datetime() - start.as_datetime(), Duration::seconds(30));
}

#[test]
fn test_timestamp_shift_past_representable_range() {
    let start = Timestamp::now();
    let huge = Duration::days(100_000_000);

    assert!(start.checked_plus(huge).is_none());
    assert_eq!(start.plus(huge).as_datetime(), DateTime::<Utc>::MAX_UTC);
    assert_eq!(
        start.checked_plus(Duration::seconds(1)),
        Some(start.plus(Duration::seconds(1)))
    );
}

#[test]
fn test_body_text_rejects_invalid_utf8() {
    let peeked = PeekedMessage {
        message_id: MessageId::new(),
        body: Bytes::from_static(&[0xff, 0xfe]),
        dequeue_count: 0,
        inserted_at: Timestamp::now(),
        expires_at: None,
    };

    assert!(matches!(
        peeked.body_text(),
        Err(SerializationError::InvalidUtf8)
    ));
}

mod send_options {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = SendOptions::new();
        assert_eq!(options.visibility_delay, Duration::zero());
        assert_eq!(options.time_to_live, TimeToLive::ServiceDefault);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let options = SendOptions::new()
            .with_visibility_delay(Duration::seconds(10))
            .with_time_to_live(Duration::hours(1));
        assert_eq!(options.time_to_live, TimeToLive::After(Duration::hours(1)));
        assert!(options.validate().is_ok());

        let forever = SendOptions::new().never_expire();
        assert_eq!(forever.time_to_live, TimeToLive::Never);
        assert!(forever.validate().is_ok());
    }

    #[test]
    fn test_delay_out_of_range() {
        let negative = SendOptions::new().with_visibility_delay(Duration::seconds(-1));
        assert!(negative.validate().is_err());

        let too_long = SendOptions::new().with_visibility_delay(Duration::days(8));
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_ttl_must_be_positive_and_exceed_delay() {
        let zero_ttl = SendOptions::new().with_time_to_live(Duration::zero());
        assert!(zero_ttl.validate().is_err());

        let delay_after_expiry = SendOptions::new()
            .with_visibility_delay(Duration::minutes(10))
            .with_time_to_live(Duration::minutes(5));
        assert!(delay_after_expiry.validate().is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        let at_limit =
            SendOptions::new().with_time_to_live(Duration::seconds(MAX_TIME_TO_LIVE_SECONDS));
        assert!(at_limit.validate().is_ok());

        let past_limit =
            SendOptions::new().with_time_to_live(Duration::seconds(MAX_TIME_TO_LIVE_SECONDS + 1));
        assert!(matches!(
            past_limit.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "time_to_live"
        ));

        let huge = SendOptions::new().with_time_to_live(Duration::days(100_000_000));
        assert!(huge.validate().is_err());
    }
}
