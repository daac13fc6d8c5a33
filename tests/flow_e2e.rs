//! Сценарий бронирования целиком через ApiClient против поднятого сервера

use std::sync::Arc;

use cinema_booking::{
    app,
    catalog::ShowFilter,
    client::{ApiClient, ClientError},
    config::Config,
    controllers::auth::RegisterRequest,
    error::BookingError,
    models::SeatId,
    reservation::{CardDetails, FlowError, FlowState, ReservationFlow},
    services::payment::MockPaymentGateway,
    AppState,
};

async fn serve(payments: Arc<MockPaymentGateway>) -> String {
    let mut config = Config::default();
    config.catalog.start_date = chrono::NaiveDate::from_ymd_opt(2030, 1, 15);
    let state = AppState::in_memory(config, payments);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn card() -> CardDetails {
    CardDetails {
        card_number: "4111111111111111".to_string(),
        expiry_date: "12/29".to_string(),
        cvv: "123".to_string(),
    }
}

#[tokio::test]
async fn browse_pick_pay_and_confirm_over_http() {
    let base = serve(Arc::new(MockPaymentGateway::approving())).await;
    let client = ApiClient::new(&base).unwrap();

    let theaters = client.theaters().await.unwrap();
    let movies = client.movies().await.unwrap();
    let shows = client
        .shows(&ShowFilter { theater_id: Some(theaters[0].id.clone()), movie_id: Some(movies[0].id.clone()) })
        .await
        .unwrap();
    let show = &shows[0];

    let mut flow = ReservationFlow::new(Arc::new(client.clone()));
    flow.select_theater(&theaters[0].id).unwrap();
    flow.select_movie(&movies[0].id).unwrap();
    flow.select_show(&show.id).unwrap();
    flow.proceed_to_seats().await.unwrap();
    flow.toggle_seat(&SeatId::from("E7")).unwrap();
    assert_eq!(flow.proceed_to_payment().unwrap(), 18);

    let booking = flow.pay(card()).await.unwrap();
    assert_eq!(booking.show_id, show.id);
    assert!(matches!(flow.state(), FlowState::Confirmed(_)));

    let bookings = client.bookings().await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].booking.id, booking.id);
    assert_eq!(bookings[0].theater, theaters[0].name);

    let seats = client.seats(&show.id).await.unwrap();
    assert!(!seats.iter().find(|s| s.id.as_str() == "E7").unwrap().available);
}

#[tokio::test]
async fn competing_shopper_triggers_refund_over_http() {
    let payments = Arc::new(MockPaymentGateway::approving());
    let base = serve(payments.clone()).await;
    let client = ApiClient::new(&base).unwrap();
    let show_id = "t3_m2_20300115_14";

    let mut flow = ReservationFlow::new(Arc::new(client.clone()));
    flow.select_show(show_id).unwrap();
    flow.proceed_to_seats().await.unwrap();
    flow.toggle_seat(&SeatId::from("A5")).unwrap();
    flow.toggle_seat(&SeatId::from("A6")).unwrap();
    flow.proceed_to_payment().unwrap();

    // Второй покупатель подтверждает A6 напрямую
    client.confirm(show_id, &[SeatId::from("A6")]).await.unwrap();

    let err = flow.pay(card()).await.unwrap_err();
    assert_eq!(err, FlowError::SeatTakenAfterPayment { seats: vec![SeatId::from("A6")], refunded: true });
    assert_eq!(payments.refunds(), 1);
    assert!(matches!(flow.state(), FlowState::SeatPicking(p) if p.selected.is_empty()));
}

#[tokio::test]
async fn client_decodes_error_bodies() {
    let base = serve(Arc::new(MockPaymentGateway::declining("card blocked"))).await;
    let client = ApiClient::new(&base).unwrap();

    let err = client.movie("m404").await.unwrap_err();
    assert!(matches!(err, ClientError::Booking(BookingError::NotFound { .. })));

    let quote = client.quote("t1_m1_20300115_10", &[SeatId::from("C1")]).await.unwrap();
    assert!(quote.requires_payment);
    assert_eq!(quote.amount, 18);
    assert_eq!(quote.pending_booking.seats, vec![SeatId::from("C1")]);

    client.confirm("t1_m1_20300115_10", &[SeatId::from("C1")]).await.unwrap();
    let err = client.confirm("t1_m1_20300115_10", &[SeatId::from("C1")]).await.unwrap_err();
    assert_eq!(err, ClientError::Booking(BookingError::SeatConflict { seats: vec![SeatId::from("C1")] }));
    let err = client.quote("t1_m1_20300115_10", &[SeatId::from("C1"), SeatId::from("C2")]).await.unwrap_err();
    assert_eq!(err, ClientError::Booking(BookingError::SeatConflict { seats: vec![SeatId::from("C1")] }));

    let mut flow = ReservationFlow::new(Arc::new(client.clone()));
    flow.select_show("t1_m1_20300115_10").unwrap();
    flow.proceed_to_seats().await.unwrap();
    flow.toggle_seat(&SeatId::from("C2")).unwrap();
    flow.proceed_to_payment().unwrap();
    let err = flow.pay(card()).await.unwrap_err();
    assert!(matches!(err, FlowError::Booking(BookingError::PaymentDeclined(_))));

    let mut bad = card();
    bad.expiry_date = "99/99".to_string();
    let err = flow.pay(bad).await.unwrap_err();
    assert!(matches!(err, FlowError::Booking(BookingError::PaymentDeclined(_))));
}

#[tokio::test]
async fn register_login_me_over_http() {
    let base = serve(Arc::new(MockPaymentGateway::approving())).await;
    let client = ApiClient::new(&base).unwrap();

    let request = RegisterRequest {
        name: "Dana".to_string(),
        age: None,
        city: Some("Almaty".to_string()),
        language: Some("kk".to_string()),
        email: "dana@example.com".to_string(),
        password: "hunter22".to_string(),
    };
    let user = client.register(&request).await.unwrap();
    assert_eq!(client.register(&request).await.unwrap_err(), ClientError::EmailTaken);

    assert!(matches!(client.me().await.unwrap_err(), ClientError::Unauthorized(_)));

    let token = client.login("dana@example.com", "hunter22").await.unwrap();
    let me = client.clone().with_token(token).me().await.unwrap();
    assert_eq!(me.id, user.id);
    assert_eq!(me.city.as_deref(), Some("Almaty"));
}
