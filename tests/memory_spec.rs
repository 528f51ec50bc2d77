use chrono::{Duration, Utc};
use speculate2::speculate;
use voyage_memory::error::MemoryError;
use voyage_memory::models::*;

fn avoid(category: NegativeCategory, value: &str) -> AddNegativePreferenceInput {
    AddNegativePreferenceInput {
        category,
        value: value.to_string(),
        reason: None,
        source: PreferenceSource::Explicit,
    }
}

speculate! {
    describe "budget presets" {
        it "maps presets to canonical ranges" {
            let eco = Budget::from_preset(BudgetPreset::Eco).unwrap();
            assert_eq!((eco.price_min, eco.price_max), (0, Some(80)));

            let luxury = Budget::from_preset(BudgetPreset::Luxury).unwrap();
            assert_eq!((luxury.price_min, luxury.price_max), (500, None));
        }

        it "requires an explicit range for custom" {
            assert!(Budget::from_preset(BudgetPreset::Custom).is_err());
            assert!(Budget::custom(200, Some(100)).is_err());
            assert_eq!(Budget::custom(60, Some(90)).unwrap().budget_preset, BudgetPreset::Custom);
        }

        it "derives a preset from a price ceiling" {
            assert_eq!(BudgetPreset::for_price_max(80), BudgetPreset::Eco);
            assert_eq!(BudgetPreset::for_price_max(150), BudgetPreset::Comfort);
            assert_eq!(BudgetPreset::for_price_max(300), BudgetPreset::Premium);
            assert_eq!(BudgetPreset::for_price_max(301), BudgetPreset::Luxury);
        }
    }

    describe "accommodation documents" {
        before {
            let mut memory = AccommodationMemory::default();
            for city in ["Tokyo", "Bangkok"] {
                memory
                    .accommodations
                    .push(AccommodationEntry::new(&Destination::new(city), memory.default_budget));
            }
        }

        it "omits the override flag until it is set" {
            let json = serde_json::to_string(&memory).unwrap();
            assert!(!json.contains("userModifiedBudget"));

            memory.accommodations[0].user_modified_budget = Some(true);
            let json = serde_json::to_string(&memory).unwrap();
            assert!(json.contains("\"userModifiedBudget\":true"));
        }

        it "flattens budget fields into the entry" {
            let value = serde_json::to_value(&memory.accommodations[0]).unwrap();
            assert_eq!(value["budgetPreset"], "comfort");
            assert_eq!(value["priceMin"], 80);
        }

        it "rejects check-out before check-in" {
            memory.accommodations[0].check_in = chrono::NaiveDate::from_ymd_opt(2026, 5, 10);
            memory.accommodations[0].check_out = chrono::NaiveDate::from_ymd_opt(2026, 5, 1);
            assert!(matches!(memory.validate(), Err(MemoryError::Validation(_))));
        }

        it "rejects an active index past the end" {
            assert!(memory.set_active(2).is_err());
            assert!(memory.set_active(1).is_ok());
            assert_eq!(memory.active().unwrap().city, "Bangkok");
        }

        it "derives rooms from travelers in auto mode" {
            let rooms = memory.effective_rooms(&Travelers::new(3, 1, 0));
            assert_eq!(rooms.iter().map(|r| r.adults).sum::<u8>(), 3);
            assert_eq!(rooms.iter().map(|r| r.children).sum::<u8>(), 1);

            memory.use_auto_rooms = false;
            memory.custom_rooms = vec![Room { adults: 3, children: 1 }];
            assert_eq!(memory.effective_rooms(&Travelers::new(3, 1, 0)).len(), 1);
        }
    }

    describe "negative preferences" {
        before {
            let mut memory = NegativePreferencesMemory::default();
            let now = Utc::now();
        }

        it "ignores duplicates after normalization" {
            let first = memory.add(avoid(NegativeCategory::Food, "Seafood"), now).unwrap();
            let second = memory.add(avoid(NegativeCategory::Food, "  seafood "), now).unwrap();

            assert!(first.is_some());
            assert!(second.is_none());
            assert_eq!(memory.preferences.len(), 1);
        }

        it "keeps the same value under different categories" {
            memory.add(avoid(NegativeCategory::Hotel, "hostel"), now).unwrap();
            memory.add(avoid(NegativeCategory::Style, "hostel"), now).unwrap();
            assert_eq!(memory.preferences.len(), 2);
        }

        it "rejects empty values" {
            assert!(memory.add(avoid(NegativeCategory::General, "   "), now).is_err());
        }

        it "evicts the oldest beyond the cap" {
            for i in 0..=MAX_NEGATIVE_PREFERENCES {
                memory
                    .add(avoid(NegativeCategory::General, &format!("thing {}", i)), now + Duration::seconds(i as i64))
                    .unwrap();
            }
            assert_eq!(memory.preferences.len(), MAX_NEGATIVE_PREFERENCES);
            assert!(!memory.is_avoided(NegativeCategory::General, "thing 0"));
            assert!(memory.is_avoided(NegativeCategory::General, "thing 100"));
        }

        it "drops entries older than the retention window" {
            memory
                .add(avoid(NegativeCategory::Timing, "red-eye"), now - Duration::days(31))
                .unwrap();
            memory.add(avoid(NegativeCategory::Timing, "early morning"), now).unwrap();

            assert_eq!(memory.prune(now), 1);
            assert!(memory.is_avoided(NegativeCategory::Timing, "early morning"));
        }

        it "summarizes by category" {
            memory.add(avoid(NegativeCategory::Food, "seafood"), now).unwrap();
            memory.add(avoid(NegativeCategory::Airline, "Ryanair"), now).unwrap();
            memory.add(avoid(NegativeCategory::Food, "spicy"), now).unwrap();

            assert_eq!(memory.summary(), "Avoid food: seafood, spicy\nAvoid airline: ryanair");
        }
    }

    describe "classified intents" {
        it "accepts classifier output with missing fields" {
            let intent: ClassifiedIntent = serde_json::from_str(
                r#"{"primaryIntent":"provide_dates","entities":{"preferredMonth":"may"}}"#,
            )
            .unwrap();

            assert_eq!(intent.confidence, 0.0);
            assert_eq!(intent.entities.preferred_month.as_deref(), Some("may"));
            assert!(intent.widget_to_show.is_none());
        }

        it "reads numeric strings as confidence" {
            let intent: ClassifiedIntent =
                serde_json::from_str(r#"{"primaryIntent":"x","confidence":"85"}"#).unwrap();
            assert_eq!(intent.confidence, 85.0);

            let intent: ClassifiedIntent =
                serde_json::from_str(r#"{"primaryIntent":"x","confidence":{"value":85}}"#).unwrap();
            assert_eq!(intent.confidence, 0.0);
        }

        it "keeps out-of-range numbers for the engine to check" {
            let intent: ClassifiedIntent = serde_json::from_str(
                r#"{"primaryIntent":"x","entities":{"comfortLevel":300,"tripDuration":-3}}"#,
            )
            .unwrap();

            assert_eq!(intent.entities.comfort_level, Some(300));
            assert_eq!(intent.entities.trip_duration, Some(-3));
        }

        it "drops a mistyped entity without losing the others" {
            let intent: ClassifiedIntent = serde_json::from_str(
                r#"{"primaryIntent":"provide_destination","confidence":90,
                    "entities":{"adults":"two","destination":{"city":"Lisbon"},"mustHaves":"pool"}}"#,
            )
            .unwrap();

            assert!(intent.entities.adults.is_none());
            assert!(intent.entities.must_haves.is_empty());
            assert_eq!(intent.entities.destination.unwrap().city, "Lisbon");
        }

        it "reads widget requests by type name" {
            let intent: ClassifiedIntent = serde_json::from_str(
                r#"{"primaryIntent":"x","confidence":80,"widgetToShow":{"type":"budgetSelector"}}"#,
            )
            .unwrap();

            let request = intent.widget_to_show.unwrap();
            assert_eq!(WidgetType::from_str(&request.widget_type), Some(WidgetType::BudgetSelector));
        }
    }
}
