//! Order read model: project fetched order details onto one header row and
//! one row per delivery stop.

use chrono::{DateTime, Utc};
use domain::OrderDetails;

use crate::PgPool;

/// Header columns derived from a fetched order. Decimal strings that fail to
/// parse persist as NULL rather than failing the row.
#[derive(Debug, PartialEq)]
pub struct NewOrderHeader<'a> {
    pub order_id: &'a str,
    pub status: &'a str,
    pub driver_id: Option<&'a str>,
    pub share_link: Option<&'a str>,
    pub total_amount: Option<f64>,
    pub currency: &'a str,
    pub distance_value: Option<i64>,
}

/// One row per stop. `stop_sequence` is the stop's zero-based position in the
/// fetched sequence, not a provider identifier, so a re-fetch that reorders
/// stops would re-key these rows (known fragility).
#[derive(Debug, PartialEq)]
pub struct NewOrderStop<'a> {
    pub order_id: &'a str,
    pub stop_sequence: i32,
    pub delivery_status: &'a str,
    pub delivered_at: Option<DateTime<Utc>>,
    pub pod_image: Option<&'a str>,
}

pub fn header_record(details: &OrderDetails) -> NewOrderHeader<'_> {
    NewOrderHeader {
        order_id: &details.order_id,
        status: &details.status,
        driver_id: details.driver_id.as_deref().filter(|d| !d.is_empty()),
        share_link: details.share_link.as_deref(),
        total_amount: details.price_breakdown.total.parse().ok(),
        currency: &details.price_breakdown.currency,
        distance_value: details.distance.value.parse().ok(),
    }
}

/// Stop rows in fetch order. Stops must not be reordered, deduplicated, or
/// filtered between fetch and persistence.
pub fn stop_records(details: &OrderDetails) -> Vec<NewOrderStop<'_>> {
    details
        .stops
        .iter()
        .enumerate()
        .map(|(i, stop)| NewOrderStop {
            order_id: &details.order_id,
            stop_sequence: i as i32,
            delivery_status: stop
                .pod
                .as_ref()
                .map(|pod| pod.status.as_str())
                .unwrap_or("PENDING"),
            delivered_at: stop
                .pod
                .as_ref()
                .and_then(|pod| pod.delivered_at.as_deref())
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            pod_image: stop.pod.as_ref().and_then(|pod| pod.image.as_deref()),
        })
        .collect()
}

/// Upsert the order header, then each stop. The statements are independent:
/// a failure mid-loop leaves earlier stops updated and later ones not, and
/// re-running converges to the same state.
pub async fn update_order_from_details(
    pool: &PgPool,
    details: &OrderDetails,
) -> Result<(), sqlx::Error> {
    upsert_order_header(pool, &header_record(details)).await?;
    for stop in stop_records(details) {
        upsert_order_stop(pool, &stop).await?;
    }
    Ok(())
}

pub async fn upsert_order_header(
    pool: &PgPool,
    header: &NewOrderHeader<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courier_orders (
          order_id, status, driver_id, share_link,
          total_amount, currency, distance_value, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        ON CONFLICT (order_id) DO UPDATE SET
          status = EXCLUDED.status,
          driver_id = EXCLUDED.driver_id,
          share_link = EXCLUDED.share_link,
          total_amount = EXCLUDED.total_amount,
          currency = EXCLUDED.currency,
          distance_value = EXCLUDED.distance_value,
          updated_at = now()
        "#,
    )
    .bind(header.order_id)
    .bind(header.status)
    .bind(header.driver_id)
    .bind(header.share_link)
    .bind(header.total_amount)
    .bind(header.currency)
    .bind(header.distance_value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_order_stop(
    pool: &PgPool,
    stop: &NewOrderStop<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courier_order_stops (
          order_id, stop_sequence, delivery_status, delivered_at, pod_image, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, now())
        ON CONFLICT (order_id, stop_sequence) DO UPDATE SET
          delivery_status = EXCLUDED.delivery_status,
          delivered_at = EXCLUDED.delivered_at,
          pod_image = EXCLUDED.pod_image,
          updated_at = now()
        "#,
    )
    .bind(stop.order_id)
    .bind(stop.stop_sequence)
    .bind(stop.delivery_status)
    .bind(stop.delivered_at)
    .bind(stop.pod_image)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::{
        Coordinates, Measure, OrderDetails, PriceBreakdown, ProofOfDelivery, Stop,
    };

    fn stop(address: &str, pod: Option<ProofOfDelivery>) -> Stop {
        Stop {
            coordinates: Coordinates {
                lat: "1.48".into(),
                lng: "103.74".into(),
            },
            address: address.into(),
            name: None,
            phone: None,
            pod,
            delivery_code: None,
        }
    }

    fn details(stops: Vec<Stop>) -> OrderDetails {
        OrderDetails {
            order_id: "186102479770".into(),
            quotation_id: None,
            price_breakdown: PriceBreakdown {
                base: Some("15.00".into()),
                special_requests: None,
                priority_fee: None,
                multi_stop_surcharge: None,
                total_exclude_priority_fee: None,
                total: "17.50".into(),
                currency: "MYR".into(),
            },
            driver_id: Some("2809512".into()),
            share_link: Some("https://share.example.com/x".into()),
            status: "COMPLETED".into(),
            distance: Measure {
                value: "7297".into(),
                unit: "m".into(),
            },
            stops,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn header_parses_decimal_strings() {
        let details = details(vec![]);
        let header = header_record(&details);
        assert_eq!(header.order_id, "186102479770");
        assert_eq!(header.total_amount, Some(17.50));
        assert_eq!(header.distance_value, Some(7297));
        assert_eq!(header.driver_id, Some("2809512"));
    }

    #[test]
    fn header_tolerates_unparsable_numbers() {
        let mut details = details(vec![]);
        details.price_breakdown.total = "free".into();
        details.distance.value = String::new();
        details.driver_id = Some(String::new());
        let header = header_record(&details);
        assert_eq!(header.total_amount, None);
        assert_eq!(header.distance_value, None);
        assert_eq!(header.driver_id, None);
    }

    #[test]
    fn stops_are_keyed_by_position_in_fetch_order() {
        let details = details(vec![
            stop("pickup", None),
            stop(
                "first drop",
                Some(ProofOfDelivery {
                    status: "DELIVERED".into(),
                    image: Some("https://pod.example.com/1.jpg".into()),
                    delivered_at: Some("2025-08-03T16:43:00.000Z".into()),
                }),
            ),
            stop(
                "second drop",
                Some(ProofOfDelivery {
                    status: "FAILED".into(),
                    image: None,
                    delivered_at: None,
                }),
            ),
        ]);

        let stops = stop_records(&details);
        assert_eq!(stops.len(), 3);
        assert_eq!(
            stops.iter().map(|s| s.stop_sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(stops.iter().all(|s| s.order_id == "186102479770"));

        // A stop without a POD block persists as PENDING with no timestamp.
        assert_eq!(stops[0].delivery_status, "PENDING");
        assert_eq!(stops[0].delivered_at, None);
        assert_eq!(stops[0].pod_image, None);

        assert_eq!(stops[1].delivery_status, "DELIVERED");
        assert_eq!(
            stops[1].delivered_at,
            Some(Utc.with_ymd_and_hms(2025, 8, 3, 16, 43, 0).unwrap())
        );
        assert_eq!(stops[1].pod_image, Some("https://pod.example.com/1.jpg"));

        assert_eq!(stops[2].delivery_status, "FAILED");
        assert_eq!(stops[2].delivered_at, None);
    }

    #[test]
    fn malformed_delivered_at_persists_as_null() {
        let details = details(vec![stop(
            "drop",
            Some(ProofOfDelivery {
                status: "DELIVERED".into(),
                image: None,
                delivered_at: Some("yesterday".into()),
            }),
        )]);
        assert_eq!(stop_records(&details)[0].delivered_at, None);
    }
}
