use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use speculate2::speculate;
use voyage_memory::db::{DocumentStore, MemoryStorage};
use voyage_memory::engine::{
    ChatStatus, LookupOutcome, MemoryEngine, RequestChannel, Resolution,
};
use voyage_memory::memory::MemoryDomain;
use voyage_memory::models::*;

fn chat(primary: &str, entities: IntentEntities) -> ClassifiedIntent {
    ClassifiedIntent {
        primary_intent: primary.to_string(),
        confidence: 90.0,
        entities,
        widget_to_show: None,
    }
}

fn budget_chat(preset: &str, city: Option<&str>) -> ClassifiedIntent {
    chat(
        "provide_budget",
        IntentEntities {
            budget: Some(BudgetEntity {
                preset: Some(preset.to_string()),
                city: city.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
}

fn entry<'a>(engine: &'a MemoryEngine, city: &str) -> &'a AccommodationEntry {
    engine
        .accommodation()
        .find_by_city(city)
        .unwrap_or_else(|| panic!("no accommodation for {}", city))
}

/// Eco default, then Tokyo and Bangkok added through the multi-destination flow.
fn tokyo_bangkok(engine: &mut MemoryEngine) {
    engine
        .set_default_budget(Budget::from_preset(BudgetPreset::Eco).unwrap())
        .unwrap();
    engine.set_trip_type(TripType::Multi).unwrap();
    engine.add_destination(Destination::new("Tokyo"), None).unwrap();
    engine.add_destination(Destination::new("Bangkok"), None).unwrap();
}

speculate! {
    before {
        let storage = Arc::new(MemoryStorage::new());
        let mut engine = MemoryEngine::load(storage.clone());
    }

    describe "budget propagation" {
        it "creates new entries from the eco default without the override flag" {
            tokyo_bangkok(&mut engine);

            assert_eq!(engine.accommodation().accommodations.len(), 2);
            for city in ["Tokyo", "Bangkok"] {
                let e = entry(&engine, city);
                assert_eq!(e.budget.budget_preset, BudgetPreset::Eco);
                assert!(e.budget.price_max.unwrap() <= 80);
                assert!(e.user_modified_budget.is_none());
            }
        }

        it "copies the defaults current at creation time" {
            tokyo_bangkok(&mut engine);
            engine
                .set_default_budget(Budget::from_preset(BudgetPreset::Luxury).unwrap())
                .unwrap();
            let id = engine.add_destination(Destination::new("Bali"), None).unwrap().unwrap();

            let bali = engine.accommodation().get(id).unwrap();
            assert_eq!(bali.budget, engine.accommodation().default_budget);
            assert_eq!(bali.budget.budget_preset, BudgetPreset::Luxury);
        }

        it "updates the defaults when the active entry is set by the user" {
            tokyo_bangkok(&mut engine);
            engine.set_budget_preset(BudgetPreset::Premium, None).unwrap();

            let acc = engine.accommodation();
            assert_eq!(acc.default_budget.budget_preset, BudgetPreset::Premium);
            assert_eq!(acc.default_source_id, Some(acc.accommodations[0].id));
            assert_eq!(entry(&engine, "Bangkok").budget.budget_preset, BudgetPreset::Eco);
        }

        it "leaves the defaults alone for a non-active entry" {
            tokyo_bangkok(&mut engine);
            let bangkok = entry(&engine, "Bangkok").id;
            engine.set_budget_preset(BudgetPreset::Luxury, Some(bangkok)).unwrap();

            assert_eq!(engine.accommodation().default_budget.budget_preset, BudgetPreset::Eco);
            assert_eq!(entry(&engine, "Bangkok").user_modified_budget, Some(true));
        }
    }

    describe "override protection" {
        it "keeps a user-set budget through a general chat request" {
            tokyo_bangkok(&mut engine);
            let tokyo = entry(&engine, "Tokyo").id;
            engine.set_budget_preset(BudgetPreset::Premium, Some(tokyo)).unwrap();

            engine.handle_chat(None, &budget_chat("eco", None)).unwrap();

            assert_eq!(entry(&engine, "Tokyo").budget.budget_preset, BudgetPreset::Premium);
            assert_eq!(entry(&engine, "Bangkok").budget.budget_preset, BudgetPreset::Eco);
        }

        it "lets a chat message naming the city override it" {
            tokyo_bangkok(&mut engine);
            let tokyo = entry(&engine, "Tokyo").id;
            engine.set_budget_preset(BudgetPreset::Premium, Some(tokyo)).unwrap();

            let outcome = engine.handle_chat(None, &budget_chat("eco", Some("tokyo"))).unwrap();

            assert!(outcome.rejected.is_empty());
            let tokyo = entry(&engine, "Tokyo");
            assert_eq!(tokyo.budget.budget_preset, BudgetPreset::Eco);
            assert_eq!(tokyo.user_modified_budget, Some(true));
            assert!(entry(&engine, "Bangkok").user_modified_budget.is_none());
        }

        it "shields protected entries from the preference bridge" {
            tokyo_bangkok(&mut engine);
            let tokyo = entry(&engine, "Tokyo").id;
            engine.set_budget_preset(BudgetPreset::Comfort, Some(tokyo)).unwrap();
            let before = entry(&engine, "Tokyo").budget;

            let applied = engine
                .apply_preferences(&PreferenceUpdate {
                    comfort_level: Some(90),
                    origin: UpdateOrigin::Chat,
                    ..Default::default()
                })
                .unwrap();

            assert_eq!(applied.map(|b| b.budget_preset), Some(BudgetPreset::Luxury));
            assert_eq!(entry(&engine, "Tokyo").budget, before);
            assert_eq!(entry(&engine, "Bangkok").budget.budget_preset, BudgetPreset::Luxury);
        }

        it "ignores widget-sourced preference updates" {
            tokyo_bangkok(&mut engine);
            let applied = engine
                .apply_preferences(&PreferenceUpdate {
                    comfort_level: Some(90),
                    origin: UpdateOrigin::Widget,
                    ..Default::default()
                })
                .unwrap();

            assert!(applied.is_none());
            assert_eq!(entry(&engine, "Bangkok").budget.budget_preset, BudgetPreset::Eco);
        }

        it "applies widget preferences when explicitly asked to" {
            tokyo_bangkok(&mut engine);
            engine
                .apply_preferences_to_hotels(&PreferenceUpdate {
                    comfort_level: Some(25),
                    ..Default::default()
                })
                .unwrap();

            assert_eq!(entry(&engine, "Tokyo").budget.budget_preset, BudgetPreset::Comfort);
            assert!(entry(&engine, "Tokyo").user_modified_budget.is_none());
        }
    }

    describe "traveler sync" {
        it "writes chat travelers to flight and travel together" {
            engine
                .handle_chat(
                    None,
                    &chat(
                        "provide_travelers",
                        IntentEntities {
                            adults: Some(2),
                            children: Some(1),
                            ..Default::default()
                        },
                    ),
                )
                .unwrap();

            let expected = Travelers::new(2, 1, 0);
            assert_eq!(engine.flight().passengers, expected);
            assert_eq!(engine.travel().travelers, expected);
            assert!(engine.travel().travelers_confirmed);
        }

        it "keeps travelers equal to passengers after every operation" {
            engine.set_passengers(Travelers::new(3, 0, 1)).unwrap();
            assert_eq!(engine.travel().travelers, engine.flight().passengers);

            engine
                .update_flight(FlightPatch {
                    passengers: Some(Travelers::new(1, 2, 0)),
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(engine.travel().travelers, engine.flight().passengers);

            engine
                .update_travel(TravelPatch {
                    travelers: Some(Travelers::new(4, 0, 0)),
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(engine.flight().passengers, Travelers::new(4, 0, 0));

            engine.reset(MemoryDomain::Flight).unwrap();
            assert_eq!(engine.travel().travelers, engine.flight().passengers);

            engine.set_passengers(Travelers::new(2, 0, 0)).unwrap();
            engine.reset(MemoryDomain::Travel).unwrap();
            assert_eq!(engine.travel().travelers, Travelers::new(2, 0, 0));
        }

        it "rejects invalid passengers without touching either store" {
            let result = engine.set_passengers(Travelers::new(1, 0, 3));

            assert!(result.is_err());
            assert_eq!(engine.flight().passengers, Travelers::default());
            assert_eq!(engine.travel().travelers, Travelers::default());
            assert_eq!(engine.revision(MemoryDomain::Flight), 0);
        }

        it "realigns diverged travelers on load" {
            storage
                .set("travel-memory", 3, r#"{"travelers":{"adults":5,"children":0,"infants":0}}"#)
                .unwrap();
            let engine = MemoryEngine::load(storage.clone());
            assert_eq!(engine.travel().travelers, engine.flight().passengers);
        }
    }

    describe "entity lifecycle" {
        it "gives a re-added city a fresh entry" {
            engine.set_trip_type(TripType::Multi).unwrap();
            engine.add_destination(Destination::new("Bangkok"), None).unwrap();
            engine.add_destination(Destination::new("Tokyo"), None).unwrap();
            let old = entry(&engine, "Tokyo").id;
            engine.set_budget_preset(BudgetPreset::Premium, Some(old)).unwrap();

            engine.set_trip_type(TripType::Oneway).unwrap();
            assert!(engine.accommodation().find_by_city("Tokyo").is_none());

            engine
                .handle_chat(
                    None,
                    &chat(
                        "provide_destination",
                        IntentEntities {
                            destinations: vec![Destination::new("Tokyo")],
                            ..Default::default()
                        },
                    ),
                )
                .unwrap();

            let tokyo = entry(&engine, "Tokyo");
            assert_ne!(tokyo.id, old);
            assert!(tokyo.user_modified_budget.is_none());
        }

        it "keeps sibling identities when a destination is removed" {
            tokyo_bangkok(&mut engine);
            engine.add_destination(Destination::new("Bali"), None).unwrap();
            let bangkok = entry(&engine, "Bangkok").id;
            let bali = entry(&engine, "Bali").id;
            engine.set_budget_preset(BudgetPreset::Luxury, Some(bali)).unwrap();

            assert!(engine.remove_destination("Tokyo").unwrap());

            assert_eq!(entry(&engine, "Bangkok").id, bangkok);
            assert_eq!(entry(&engine, "Bali").id, bali);
            assert_eq!(entry(&engine, "Bali").user_modified_budget, Some(true));
            assert!(engine.flight().legs.iter().all(|l| l.to.city != "Tokyo"));
        }

        it "reports unknown destinations as not removed" {
            tokyo_bangkok(&mut engine);
            assert!(!engine.remove_destination("Lima").unwrap());
            assert_eq!(engine.accommodation().accommodations.len(), 2);
        }

        it "takes stay dates from the flight" {
            engine
                .update_flight(FlightPatch {
                    arrival: Some(Airport::city(&Destination::new("Lisbon"))),
                    departure_date: NaiveDate::from_ymd_opt(2026, 9, 3),
                    return_date: NaiveDate::from_ymd_opt(2026, 9, 10),
                    ..Default::default()
                })
                .unwrap();

            let lisbon = entry(&engine, "Lisbon");
            assert_eq!(lisbon.check_in, NaiveDate::from_ymd_opt(2026, 9, 3));
            assert_eq!(lisbon.check_out, NaiveDate::from_ymd_opt(2026, 9, 10));
        }
    }

    describe "itinerary changes" {
        it "keeps a user check-out when flight dates arrive later" {
            engine.add_destination(Destination::new("Lisbon"), None).unwrap();
            engine
                .update_accommodation(
                    None,
                    AccommodationPatch {
                        check_out: NaiveDate::from_ymd_opt(2026, 9, 5),
                        ..Default::default()
                    },
                )
                .unwrap();

            engine
                .update_flight(FlightPatch {
                    departure_date: NaiveDate::from_ymd_opt(2026, 9, 10),
                    ..Default::default()
                })
                .unwrap();

            let lisbon = entry(&engine, "Lisbon");
            assert_eq!(lisbon.check_out, NaiveDate::from_ymd_opt(2026, 9, 5));
            assert!(lisbon.check_in.is_none());

            engine.add_destination(Destination::new("Porto"), None).unwrap();
            let cities: Vec<_> = engine.flight().destinations().into_iter().map(|d| d.city).collect();
            assert_eq!(cities, vec!["Lisbon", "Porto"]);
            assert!(engine.accommodation().find_by_city("Porto").is_some());
        }

        it "writes neither store when the itinerary change is rejected" {
            let flight_revision = engine.revision(MemoryDomain::Flight);
            let accommodation_revision = engine.revision(MemoryDomain::Accommodation);

            let result = engine.update_flight(FlightPatch {
                arrival: Some(Airport::city(&Destination::new("Lisbon"))),
                departure_date: NaiveDate::from_ymd_opt(2026, 9, 10),
                return_date: NaiveDate::from_ymd_opt(2026, 9, 1),
                ..Default::default()
            });

            assert!(result.is_err());
            assert!(engine.flight().arrival.is_none());
            assert!(engine.accommodation().accommodations.is_empty());
            assert_eq!(engine.revision(MemoryDomain::Flight), flight_revision);
            assert_eq!(engine.revision(MemoryDomain::Accommodation), accommodation_revision);
        }

        it "returns the existing entry for a city already on the trip" {
            let first = engine.add_destination(Destination::new("Lisbon"), None).unwrap();
            let again = engine.add_destination(Destination::new("Lisbon"), None).unwrap();

            assert!(first.is_some());
            assert_eq!(again, first);
            assert_eq!(engine.accommodation().accommodations.len(), 1);
        }
    }

    describe "persistence" {
        it "reloads the same accommodation state" {
            tokyo_bangkok(&mut engine);
            let original = engine.accommodation().clone();

            let reloaded = MemoryEngine::load(storage.clone());
            assert_eq!(reloaded.accommodation(), &original);
            assert_eq!(
                reloaded.revision(MemoryDomain::Accommodation),
                engine.revision(MemoryDomain::Accommodation)
            );
        }

        it "serializes byte-identically after a round trip" {
            tokyo_bangkok(&mut engine);
            engine.set_passengers(Travelers::new(2, 1, 1)).unwrap();

            for domain in MemoryDomain::ALL {
                let first = engine.serialize(domain).unwrap();
                let reloaded = MemoryEngine::load(storage.clone());
                assert_eq!(reloaded.serialize(domain).unwrap(), first);
            }
        }

        it "broadcasts one change per store write" {
            let mut rx = engine.subscribe();
            engine.set_passengers(Travelers::new(2, 0, 0)).unwrap();

            let mut domains = Vec::new();
            while let Ok(change) = rx.try_recv() {
                domains.push(change.domain);
            }
            assert_eq!(domains, vec![MemoryDomain::Flight, MemoryDomain::Travel]);
        }
    }

    describe "chat" {
        it "suppresses low-confidence messages entirely" {
            let mut intent = chat(
                "provide_destination",
                IntentEntities {
                    destination: Some(Destination::new("Rome")),
                    ..Default::default()
                },
            );
            intent.confidence = 20.0;

            let outcome = engine.handle_chat(None, &intent).unwrap();
            assert_eq!(outcome.status, ChatStatus::LowConfidence);
            assert_eq!(outcome.resolution, Resolution::Suppressed);
            assert_eq!(engine.revision(MemoryDomain::Flight), 0);
        }

        it "asks for dates once the destination is known" {
            let outcome = engine
                .handle_chat(
                    None,
                    &chat(
                        "provide_travelers",
                        IntentEntities {
                            destination: Some(Destination::new("Rome")),
                            ..Default::default()
                        },
                    ),
                )
                .unwrap();

            match outcome.resolution {
                Resolution::Show { widget } => assert_eq!(widget.widget, WidgetType::DateRangePicker),
                other => panic!("unexpected {:?}", other),
            }
        }

        it "dispatches control actions to the registered sink" {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            engine.set_action_sink(Box::new(move |action: ControlAction| {
                sink.lock().unwrap().push(action);
            }));

            let outcome = engine.handle_chat(None, &chat("trigger_search", IntentEntities::default())).unwrap();

            assert_eq!(
                outcome.resolution,
                Resolution::Dispatch { action: ControlAction::TriggerSearch }
            );
            assert_eq!(*seen.lock().unwrap(), vec![ControlAction::TriggerSearch]);
        }

        it "records rejections as negative preferences" {
            engine
                .handle_chat(
                    None,
                    &chat(
                        "general_question",
                        IntentEntities {
                            rejections: vec![RejectionEntity {
                                category: "food".to_string(),
                                value: "Seafood".to_string(),
                                reason: None,
                            }],
                            ..Default::default()
                        },
                    ),
                )
                .unwrap();

            assert!(engine.negative_preferences().is_avoided(NegativeCategory::Food, "seafood"));
        }
    }

    describe "lookups" {
        it "applies the top candidate of the latest lookup" {
            let ticket = engine.begin_request(RequestChannel::Arrival);
            let candidates = vec![LocationCandidate {
                name: "Narita International".to_string(),
                kind: LocationKind::Airport,
                country_code: "JP".to_string(),
                country: Some("Japan".to_string()),
                city: Some("Tokyo".to_string()),
                iata: Some("NRT".to_string()),
                lat: 35.77,
                lng: 140.39,
            }];

            let outcome = engine.complete_lookup(ticket, &candidates).unwrap();

            assert_eq!(outcome, LookupOutcome::Applied);
            assert_eq!(engine.flight().arrival.as_ref().unwrap().iata.as_deref(), Some("NRT"));
            assert!(engine.accommodation().find_by_city("Tokyo").is_some());
        }

        it "discards results of superseded lookups" {
            let stale = engine.begin_request(RequestChannel::Departure);
            let _fresh = engine.begin_request(RequestChannel::Departure);
            let candidates = vec![LocationCandidate {
                name: "Humberto Delgado".to_string(),
                kind: LocationKind::Airport,
                country_code: "PT".to_string(),
                country: Some("Portugal".to_string()),
                city: Some("Lisbon".to_string()),
                iata: Some("LIS".to_string()),
                lat: 38.77,
                lng: -9.13,
            }];

            let outcome = engine.complete_lookup(stale, &candidates).unwrap();

            assert_eq!(outcome, LookupOutcome::Stale);
            assert!(engine.flight().departure.is_none());
            assert_eq!(engine.revision(MemoryDomain::Flight), 0);
        }
    }
}
