// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

mod utils;

use chrono::Utc;

use opcua_server_core::server::address_space::AddressSpace;
use opcua_server_core::server::services::method::SERVER_RESEND_DATA;
use opcua_server_core::types::*;

use utils::*;

#[test]
fn publish_delivers_data_change() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    let result = create_monitored_item(&server, &token, subscription_id, test_var(), 11);
    assert_eq!(result.status_code, StatusCode::Good);

    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    assert_eq!(responses.len(), 1);
    let response = expect_publish_response(&responses[0]);
    assert_eq!(response.subscription_id, subscription_id);
    assert_eq!(response.notification_message.sequence_number, 1);
    let notifications = response.notification_message.data_change_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].client_handle, 11);
    assert_eq!(notifications[0].value.value, Some(Variant::Int32(0)));
}

#[test]
fn sequence_numbers_increase_by_one_per_data_message() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    let mut sequence_numbers = Vec::new();
    for i in 1..=3 {
        publish(&server, &token, i, None);
        write_value(&server, &token, test_var(), 100 + i as i32);
        let responses = tick_and_take(&server, &token, 150 * i as i64);
        for entry in &responses {
            let response = expect_publish_response(entry);
            if !response.notification_message.is_keep_alive() {
                sequence_numbers.push(response.notification_message.sequence_number);
            }
        }
    }
    assert_eq!(sequence_numbers, vec![1, 2, 3]);
}

#[test]
fn republish_returns_identical_content_until_acknowledged() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    let original = expect_publish_response(&responses[0]).notification_message.clone();

    // Republish returns exactly what was published at that sequence number
    let republished = server
        .republish(&RepublishRequest {
            request_header: request_header(&token),
            subscription_id,
            retransmit_sequence_number: original.sequence_number,
        })
        .unwrap();
    assert_eq!(republished.notification_message, original);

    // A sequence number that was never sent is not available
    let err = server
        .republish(&RepublishRequest {
            request_header: request_header(&token),
            subscription_id,
            retransmit_sequence_number: 99,
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadMessageNotAvailable);

    // Acknowledging releases the retained message
    publish(
        &server,
        &token,
        2,
        Some(vec![SubscriptionAcknowledgement {
            subscription_id,
            sequence_number: original.sequence_number,
        }]),
    );
    let err = server
        .republish(&RepublishRequest {
            request_header: request_header(&token),
            subscription_id,
            retransmit_sequence_number: original.sequence_number,
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadMessageNotAvailable);
}

#[test]
fn duplicate_acknowledgement_is_localized() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    publish(&server, &token, 1, None);
    let _ = tick_and_take(&server, &token, 150);

    // Acknowledge sequence number 1 twice in consecutive requests, plus an unknown one
    publish(
        &server,
        &token,
        2,
        Some(vec![SubscriptionAcknowledgement {
            subscription_id,
            sequence_number: 1,
        }]),
    );
    write_value(&server, &token, test_var(), 5);
    let responses = tick_and_take(&server, &token, 300);
    let response = expect_publish_response(&responses[0]);
    assert_eq!(response.results, Some(vec![StatusCode::Good]));

    publish(
        &server,
        &token,
        3,
        Some(vec![
            SubscriptionAcknowledgement {
                subscription_id,
                sequence_number: 1,
            },
            SubscriptionAcknowledgement {
                subscription_id: 9999,
                sequence_number: 1,
            },
        ]),
    );
    write_value(&server, &token, test_var(), 6);
    let responses = tick_and_take(&server, &token, 450);
    let response = expect_publish_response(&responses[0]);
    // The publish succeeded; only the ack results carry the localized errors
    assert_eq!(
        response.results,
        Some(vec![
            StatusCode::BadSequenceNumberUnknown,
            StatusCode::BadSubscriptionIdInvalid
        ])
    );
}

#[test]
fn percent_deadband_suppresses_small_changes() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    let filter = MonitoringFilter::DataChange(DataChangeFilter {
        trigger: DataChangeTrigger::StatusValue,
        deadband: Deadband::Percent(10.0),
    });
    let result = create_monitored_item_with_filter(
        &server,
        &token,
        subscription_id,
        ranged_var(),
        21,
        filter,
    );
    assert_eq!(result.status_code, StatusCode::Good);

    // Initial value 50 is delivered
    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    assert_eq!(responses.len(), 1);

    // A change within 10% of the [0, 100] range produces nothing
    write_value(&server, &token, ranged_var(), 59.0f64);
    publish(&server, &token, 2, None);
    let responses = tick_and_take(&server, &token, 300);
    assert!(responses.is_empty());

    // A change beyond the threshold produces exactly one notification
    write_value(&server, &token, ranged_var(), 70.0f64);
    let responses = tick_and_take(&server, &token, 450);
    assert_eq!(responses.len(), 1);
    let response = expect_publish_response(&responses[0]);
    let notifications = response.notification_message.data_change_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].value.value, Some(Variant::Double(70.0)));
}

#[test]
fn percent_deadband_without_range_is_unsupported() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    let filter = MonitoringFilter::DataChange(DataChangeFilter {
        trigger: DataChangeTrigger::StatusValue,
        deadband: Deadband::Percent(10.0),
    });
    // test_var has no EU range
    let result =
        create_monitored_item_with_filter(&server, &token, subscription_id, test_var(), 21, filter);
    assert_eq!(
        result.status_code,
        StatusCode::BadMonitoredItemFilterUnsupported
    );
}

#[test]
fn semantics_changed_bit_follows_range_changes() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    create_monitored_item(&server, &token, subscription_id, ranged_var(), 21);

    // Initial delivery - no semantics bit, the range is as it was at creation
    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    let notification = &expect_publish_response(&responses[0]).notification_message;
    let value = &notification.data_change_notifications()[0].value;
    assert!(!value.status().contains(StatusCode::SEMANTICS_CHANGED));

    // The engineering range moves; the next notification carries the bit
    {
        let address_space = server.address_space();
        let mut address_space = address_space.write();
        address_space.set_eu_range(&ranged_var(), Some((0.0, 200.0)));
    }
    write_value(&server, &token, ranged_var(), 80.0f64);
    publish(&server, &token, 2, None);
    let responses = tick_and_take(&server, &token, 300);
    let notification = &expect_publish_response(&responses[0]).notification_message;
    let value = &notification.data_change_notifications()[0].value;
    assert!(value.status().contains(StatusCode::SEMANTICS_CHANGED));

    // An ordinary change afterwards clears the bit again
    write_value(&server, &token, ranged_var(), 90.0f64);
    publish(&server, &token, 3, None);
    let responses = tick_and_take(&server, &token, 450);
    let notification = &expect_publish_response(&responses[0]).notification_message;
    let value = &notification.data_change_notifications()[0].value;
    assert!(!value.status().contains(StatusCode::SEMANTICS_CHANGED));
}

#[test]
fn resend_data_redelivers_without_a_value_change() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    let original = expect_publish_response(&responses[0]).notification_message.clone();

    // No value change: a ResendData call re-delivers the last known value immediately
    publish(&server, &token, 2, None);
    let response = server
        .call(&CallRequest {
            request_header: request_header(&token),
            methods_to_call: Some(vec![CallMethodRequest {
                object_id: NodeId::new(0, AddressSpace::SERVER),
                method_id: NodeId::new(0, SERVER_RESEND_DATA),
                input_arguments: Some(vec![Variant::UInt32(subscription_id)]),
            }]),
        })
        .unwrap();
    assert_eq!(response.results.unwrap()[0].status_code, StatusCode::Good);

    let responses: Vec<_> = server.take_publish_responses(&token).into_iter().collect();
    assert_eq!(responses.len(), 1);
    let resent = expect_publish_response(&responses[0]);
    assert_eq!(resent.notification_message.sequence_number, 2);
    assert_eq!(
        resent.notification_message.data_change_notifications()[0].value.value,
        original.data_change_notifications()[0].value.value
    );
}

#[test]
fn resend_data_on_unknown_subscription() {
    let server = default_server();
    let token = connect(&server);
    let response = server
        .call(&CallRequest {
            request_header: request_header(&token),
            methods_to_call: Some(vec![CallMethodRequest {
                object_id: NodeId::new(0, AddressSpace::SERVER),
                method_id: NodeId::new(0, SERVER_RESEND_DATA),
                input_arguments: Some(vec![Variant::UInt32(555)]),
            }]),
        })
        .unwrap();
    assert_eq!(
        response.results.unwrap()[0].status_code,
        StatusCode::BadSubscriptionIdInvalid
    );
}

#[test]
fn transfer_preserves_sequence_continuity_and_retained_messages() {
    let server = default_server();
    let token_a = connect(&server);
    let subscription_id = create_subscription(&server, &token_a);
    create_monitored_item(&server, &token_a, subscription_id, test_var(), 11);

    // Deliver sequence number 1 on session A without acknowledging it
    publish(&server, &token_a, 1, None);
    let responses = tick_and_take(&server, &token_a, 150);
    let first = expect_publish_response(&responses[0]).notification_message.clone();
    assert_eq!(first.sequence_number, 1);

    // Transfer to session B
    let token_b = connect(&server);
    let response = server
        .transfer_subscriptions(&TransferSubscriptionsRequest {
            request_header: request_header(&token_b),
            subscription_ids: Some(vec![subscription_id]),
            send_initial_values: false,
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    // The unacknowledged message moved with the subscription
    assert_eq!(results[0].available_sequence_numbers, Some(vec![1]));

    // Republish of the retained message now works through session B
    let republished = server
        .republish(&RepublishRequest {
            request_header: request_header(&token_b),
            subscription_id,
            retransmit_sequence_number: 1,
        })
        .unwrap();
    assert_eq!(republished.notification_message, first);

    // And the next data message continues the sequence at 2 on session B
    write_value(&server, &token_b, test_var(), 42);
    publish(&server, &token_b, 1, None);
    let responses = tick_and_take(&server, &token_b, 300);
    let next = expect_publish_response(&responses[0]);
    assert_eq!(next.notification_message.sequence_number, 2);

    // Session A no longer owns the subscription
    let err = server
        .republish(&RepublishRequest {
            request_header: request_header(&token_a),
            subscription_id,
            retransmit_sequence_number: 1,
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadSubscriptionIdInvalid);
}

#[test]
fn subscription_counters_track_create_and_delete() {
    let server = default_server();
    let token = connect(&server);
    let before = match read_value(
        &server,
        &token,
        NodeId::new(0, AddressSpace::CURRENT_SUBSCRIPTION_COUNT),
    )
    .value
    {
        Some(Variant::UInt32(v)) => v,
        other => panic!("unexpected {:?}", other),
    };
    let subscription_id = create_subscription(&server, &token);
    let current = match read_value(
        &server,
        &token,
        NodeId::new(0, AddressSpace::CURRENT_SUBSCRIPTION_COUNT),
    )
    .value
    {
        Some(Variant::UInt32(v)) => v,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(current, before + 1);

    server
        .delete_subscriptions(&DeleteSubscriptionsRequest {
            request_header: request_header(&token),
            subscription_ids: Some(vec![subscription_id]),
        })
        .unwrap();
    let current = match read_value(
        &server,
        &token,
        NodeId::new(0, AddressSpace::CURRENT_SUBSCRIPTION_COUNT),
    )
    .value
    {
        Some(Variant::UInt32(v)) => v,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(current, before);
}

#[test]
fn publish_without_subscription_is_an_error() {
    let server = default_server();
    let token = connect(&server);
    let err = server
        .publish(
            1,
            &PublishRequest {
                request_header: request_header(&token),
                subscription_acknowledgements: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadNoSubscription);
}

#[test]
fn monitored_item_batch_results_are_per_item() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);

    // One good item and one with an unsupported filter in the same batch
    let bad_filter = MonitoringFilter::DataChange(DataChangeFilter {
        trigger: DataChangeTrigger::StatusValue,
        deadband: Deadband::Percent(10.0),
    });
    let response = server
        .create_monitored_items(&CreateMonitoredItemsRequest {
            request_header: request_header(&token),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![
                MonitoredItemCreateRequest {
                    item_to_monitor: ReadValueId::value_of(test_var()),
                    monitoring_mode: MonitoringMode::Reporting,
                    requested_parameters: MonitoringParameters {
                        client_handle: 1,
                        sampling_interval: -1.0,
                        filter: MonitoringFilter::None,
                        queue_size: 2,
                        discard_oldest: true,
                    },
                },
                MonitoredItemCreateRequest {
                    item_to_monitor: ReadValueId::value_of(test_var()),
                    monitoring_mode: MonitoringMode::Reporting,
                    requested_parameters: MonitoringParameters {
                        client_handle: 2,
                        sampling_interval: -1.0,
                        filter: bad_filter,
                        queue_size: 2,
                        discard_oldest: true,
                    },
                },
            ]),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(
        results[1].status_code,
        StatusCode::BadMonitoredItemFilterUnsupported
    );

    // Deleting the good one and a bogus id in one batch is also per-item
    let response = server
        .delete_monitored_items(&DeleteMonitoredItemsRequest {
            request_header: request_header(&token),
            subscription_id,
            monitored_item_ids: Some(vec![results[0].monitored_item_id, 999]),
        })
        .unwrap();
    assert_eq!(
        response.results.unwrap(),
        vec![StatusCode::Good, StatusCode::BadMonitoredItemIdInvalid]
    );
}

#[test]
fn event_monitored_item_delivers_selected_fields() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);

    let filter = MonitoringFilter::Event(EventFilter {
        select_clauses: vec!["Message".to_string(), "Severity".to_string()],
    });
    let response = server
        .create_monitored_items(&CreateMonitoredItemsRequest {
            request_header: request_header(&token),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id: objects_folder(),
                    attribute_id: AttributeId::EventNotifier as u32,
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 31,
                    sampling_interval: 0.0,
                    filter,
                    queue_size: 10,
                    discard_oldest: true,
                },
            }]),
        })
        .unwrap();
    assert_eq!(
        response.results.unwrap()[0].status_code,
        StatusCode::Good
    );

    // Raise an event against the folder
    {
        let address_space = server.address_space();
        let mut address_space = address_space.write();
        let event = opcua_server_core::server::events::Event::new(
            NodeId::new(0, 2041u32),
            objects_folder(),
            Utc::now() + chrono::Duration::milliseconds(50),
            "boiler overheating",
        )
        .field("Severity", 900u16);
        address_space.raise_event(event);
    }

    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    assert_eq!(responses.len(), 1);
    let response = expect_publish_response(&responses[0]);
    let events = response.notification_message.event_notifications();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].client_handle, 31);
    assert_eq!(
        events[0].event_fields,
        vec![
            Variant::String("boiler overheating".to_string()),
            Variant::UInt16(900)
        ]
    );
}

#[test]
fn queue_overflow_flags_exactly_one_boundary_item() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);

    // Queue of 3, discard oldest
    let response = server
        .create_monitored_items(&CreateMonitoredItemsRequest {
            request_header: request_header(&token),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(test_var()),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 41,
                    sampling_interval: -1.0,
                    filter: MonitoringFilter::None,
                    queue_size: 3,
                    discard_oldest: true,
                },
            }]),
        })
        .unwrap();
    assert_eq!(response.results.unwrap()[0].status_code, StatusCode::Good);

    // Five samples while no publish request is available - the queue overflows twice
    for i in 1..=5 {
        write_value(&server, &token, test_var(), i as i32);
        let responses = tick_and_take(&server, &token, 150 * i as i64);
        assert!(responses.is_empty());
    }

    // The oldest two were discarded; exactly one notification, the oldest retained, carries
    // the overflow flag
    publish(&server, &token, 1, None);
    let responses: Vec<_> = server.take_publish_responses(&token).into_iter().collect();
    assert_eq!(responses.len(), 1);
    let response = expect_publish_response(&responses[0]);
    let notifications = response.notification_message.data_change_notifications();
    let values: Vec<Variant> = notifications
        .iter()
        .map(|n| n.value.value.clone().unwrap())
        .collect();
    assert_eq!(
        values,
        vec![Variant::Int32(3), Variant::Int32(4), Variant::Int32(5)]
    );
    let overflowed: Vec<bool> = notifications
        .iter()
        .map(|n| n.value.status().contains(StatusCode::OVERFLOW))
        .collect();
    assert_eq!(overflowed, vec![true, false, false]);
}

#[test]
fn starved_subscription_expires_with_a_status_change() {
    let server = default_server();
    let token = connect(&server);
    // Keep alive of 2 revises the lifetime to the minimum of 6
    let response = server
        .create_subscription(&CreateSubscriptionRequest {
            request_header: request_header(&token),
            requested_publishing_interval: 100.0,
            requested_lifetime_count: 1,
            requested_max_keep_alive_count: 2,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        })
        .unwrap();
    assert_eq!(response.revised_lifetime_count, 6);
    let subscription_id = response.subscription_id;
    create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    // No publish request ever arrives; the lifetime runs out
    for i in 1..=10 {
        let responses = tick_and_take(&server, &token, 150 * i);
        assert!(responses.is_empty());
    }

    // The terminal status change is still delivered on the next publish request
    publish(&server, &token, 1, None);
    let responses: Vec<_> = server.take_publish_responses(&token).into_iter().collect();
    assert_eq!(responses.len(), 1);
    let response = expect_publish_response(&responses[0]);
    let NotificationData::StatusChange(status_change) =
        &response.notification_message.notification_data[0]
    else {
        panic!("expected a status change notification");
    };
    assert_eq!(status_change.status, StatusCode::BadTimeout);

    // With the expired subscription gone, further publishes have nothing to serve
    let err = server
        .publish(
            2,
            &PublishRequest {
                request_header: request_header(&token),
                subscription_acknowledgements: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadNoSubscription);
}

#[test]
fn publishing_disabled_suppresses_delivery_until_reenabled() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    let response = server
        .set_publishing_mode(&SetPublishingModeRequest {
            request_header: request_header(&token),
            publishing_enabled: false,
            subscription_ids: Some(vec![subscription_id, 9999]),
        })
        .unwrap();
    assert_eq!(
        response.results.unwrap(),
        vec![StatusCode::Good, StatusCode::BadSubscriptionIdInvalid]
    );

    // A value change while disabled goes nowhere
    write_value(&server, &token, test_var(), 42);
    publish(&server, &token, 1, None);
    assert!(tick_and_take(&server, &token, 150).is_empty());

    // Re-enabled, the pending change is sampled and delivered
    server
        .set_publishing_mode(&SetPublishingModeRequest {
            request_header: request_header(&token),
            publishing_enabled: true,
            subscription_ids: Some(vec![subscription_id]),
        })
        .unwrap();
    let mut delivered = Vec::new();
    for i in 2..=3 {
        delivered.extend(tick_and_take(&server, &token, 150 * i));
    }
    assert_eq!(delivered.len(), 1);
    let response = expect_publish_response(&delivered[0]);
    assert_eq!(
        response.notification_message.data_change_notifications()[0]
            .value
            .value,
        Some(Variant::Int32(42))
    );
}

#[test]
fn stale_publish_request_times_out_locally() {
    let server = default_server();
    let token = connect(&server);
    create_subscription(&server, &token);

    // First request is consumed by the first keep-alive
    publish(&server, &token, 1, None);
    let responses = tick_and_take(&server, &token, 150);
    assert_eq!(responses.len(), 1);
    assert!(expect_publish_response(&responses[0])
        .notification_message
        .is_keep_alive());

    // The second request carries a 1s timeout hint and nothing to deliver
    server
        .publish(
            2,
            &PublishRequest {
                request_header: {
                    let mut header = request_header(&token);
                    header.timeout_hint = 1_000;
                    header
                },
                subscription_acknowledgements: None,
            },
        )
        .unwrap();
    assert!(tick_and_take(&server, &token, 300).is_empty());

    // Once the hint elapses the request is failed back with a timeout fault
    let responses = tick_and_take(&server, &token, 2_000);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].request_id, 2);
    match &responses[0].response {
        opcua_server_core::server::subscriptions::PublishServiceResponse::Fault(fault) => {
            assert_eq!(fault.status(), StatusCode::BadTimeout);
        }
        _ => panic!("expected a timeout fault"),
    }
}

#[test]
fn modify_monitored_items_revises_per_item() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    let created = create_monitored_item(&server, &token, subscription_id, test_var(), 11);

    let response = server
        .modify_monitored_items(&ModifyMonitoredItemsRequest {
            request_header: request_header(&token),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_modify: Some(vec![
                MonitoredItemModifyRequest {
                    monitored_item_id: created.monitored_item_id,
                    requested_parameters: MonitoringParameters {
                        client_handle: 11,
                        // Below the server minimum - clamped, not rejected
                        sampling_interval: 10.0,
                        filter: MonitoringFilter::None,
                        queue_size: 0,
                        discard_oldest: true,
                    },
                },
                MonitoredItemModifyRequest {
                    monitored_item_id: 999,
                    requested_parameters: MonitoringParameters::default(),
                },
            ]),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[0].revised_sampling_interval, 100.0);
    assert_eq!(results[0].revised_queue_size, 1);
    assert_eq!(results[1].status_code, StatusCode::BadMonitoredItemIdInvalid);
}

#[test]
fn empty_event_filter_is_rejected_at_creation() {
    let server = default_server();
    let token = connect(&server);
    let subscription_id = create_subscription(&server, &token);
    let filter = MonitoringFilter::Event(EventFilter {
        select_clauses: vec![],
    });
    let result = create_monitored_item_with_filter(
        &server,
        &token,
        subscription_id,
        objects_folder(),
        31,
        filter,
    );
    assert_eq!(result.status_code, StatusCode::BadEventFilterInvalid);
}
