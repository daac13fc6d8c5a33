//! Сценарий покупки билета как явная машина состояний.
//!
//! `Selecting -> SeatPicking -> Paying -> Confirmed`, плюс `Abandoned`.
//! Все переходы до оплаты локальные и без побочных эффектов; внешние
//! эффекты (авторизация платежа и подтверждение брони) происходят только
//! на ребре `Paying -> Confirmed`.
//!
//! Если деньги списаны, а места за это время кто-то занял, платёж
//! возвращается и сценарий откатывается к выбору мест с пометкой
//! занятых мест в снимке карты.

mod backend;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    error::{join_seats, BookingError},
    models::{Booking, Seat, SeatId},
    services::payment::{PaymentReceipt, PaymentRequest},
};

pub use backend::{BookingBackend, LocalBackend};

/// Фильтры и выбранный сеанс на первом шаге
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub theater_id: Option<String>,
    pub movie_id: Option<String>,
    pub show_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatPicking {
    pub show_id: String,
    /// Снимок карты мест на момент перехода. Может устареть
    pub seats: Vec<Seat>,
    pub selected: Vec<SeatId>,
}

impl SeatPicking {
    fn seat(&self, id: &SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.id == id)
    }

    /// Сумма за выбранные места по снимку
    pub fn total(&self) -> i64 {
        self.selected.iter().filter_map(|id| self.seat(id)).map(|s| s.price).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paying {
    pub show_id: String,
    pub seats: Vec<Seat>,
    pub selected: Vec<SeatId>,
    pub amount: i64,
    /// Платёж уже авторизован, но бронь ещё не подтверждена
    pub receipt: Option<PaymentReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Selecting(Selection),
    SeatPicking(SeatPicking),
    Paying(Paying),
    Confirmed(Booking),
    Abandoned,
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Selecting(_) => "selecting",
            FlowState::SeatPicking(_) => "seat_picking",
            FlowState::Paying(_) => "paying",
            FlowState::Confirmed(_) => "confirmed",
            FlowState::Abandoned => "abandoned",
        }
    }
}

/// Данные карты с формы оплаты
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("choose a show first")]
    NoShowChosen,

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: &'static str },

    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Оплата прошла, но места заняли после того, как их выбрали
    #[error("seat taken since you selected it: {}", join_seats(.seats))]
    SeatTakenAfterPayment { seats: Vec<SeatId>, refunded: bool },
}

impl FlowError {
    fn invalid(action: &'static str, state: &FlowState) -> Self {
        FlowError::InvalidTransition { action, state: state.name() }
    }
}

pub struct ReservationFlow<B: ?Sized> {
    backend: Arc<B>,
    state: FlowState,
}

impl<B: BookingBackend + ?Sized> ReservationFlow<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend, state: FlowState::Selecting(Selection::default()) }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    fn selection_mut(&mut self, action: &'static str) -> Result<&mut Selection, FlowError> {
        match &mut self.state {
            FlowState::Selecting(selection) => Ok(selection),
            other => Err(FlowError::invalid(action, other)),
        }
    }

    pub fn select_theater(&mut self, theater_id: &str) -> Result<(), FlowError> {
        self.selection_mut("select theater")?.theater_id = Some(theater_id.to_string());
        Ok(())
    }

    pub fn select_movie(&mut self, movie_id: &str) -> Result<(), FlowError> {
        self.selection_mut("select movie")?.movie_id = Some(movie_id.to_string());
        Ok(())
    }

    pub fn select_show(&mut self, show_id: &str) -> Result<(), FlowError> {
        self.selection_mut("select show")?.show_id = Some(show_id.to_string());
        Ok(())
    }

    /// `Selecting -> SeatPicking`: берёт снимок карты мест выбранного сеанса
    pub async fn proceed_to_seats(&mut self) -> Result<(), FlowError> {
        let show_id = match &self.state {
            FlowState::Selecting(selection) => selection.show_id.clone().ok_or(FlowError::NoShowChosen)?,
            other => return Err(FlowError::invalid("pick seats", other)),
        };

        let seats = self.backend.seats(&show_id).await?;
        debug!(show_id = %show_id, seats = seats.len(), "seat map snapshot taken");

        self.state = FlowState::SeatPicking(SeatPicking { show_id, seats, selected: Vec::new() });
        Ok(())
    }

    /// Переключает место в выборе. Возвращает `true`, если место теперь выбрано
    pub fn toggle_seat(&mut self, seat_id: &SeatId) -> Result<bool, FlowError> {
        let picking = match &mut self.state {
            FlowState::SeatPicking(picking) => picking,
            other => return Err(FlowError::invalid("toggle seat", other)),
        };

        if let Some(pos) = picking.selected.iter().position(|s| s == seat_id) {
            picking.selected.remove(pos);
            return Ok(false);
        }

        let seat = picking.seat(seat_id).ok_or_else(|| {
            BookingError::InvalidSelection(format!("seat {} does not exist", seat_id))
        })?;
        if !seat.available {
            return Err(BookingError::InvalidSelection(format!("seat {} is not available", seat_id)).into());
        }

        picking.selected.push(seat_id.clone());
        Ok(true)
    }

    /// `SeatPicking -> Paying`: выбор не пуст, все места свободны по снимку.
    /// Возвращает сумму к оплате.
    pub fn proceed_to_payment(&mut self) -> Result<i64, FlowError> {
        let picking = match &self.state {
            FlowState::SeatPicking(picking) => picking,
            other => return Err(FlowError::invalid("pay", other)),
        };

        if picking.selected.is_empty() {
            return Err(BookingError::InvalidSelection("no seats selected".to_string()).into());
        }
        for id in &picking.selected {
            if !picking.seat(id).is_some_and(|s| s.available) {
                return Err(BookingError::InvalidSelection(format!("seat {} is not available", id)).into());
            }
        }

        let amount = picking.total();
        let picking = picking.clone();
        self.state = FlowState::Paying(Paying {
            show_id: picking.show_id,
            seats: picking.seats,
            selected: picking.selected,
            amount,
            receipt: None,
        });
        Ok(amount)
    }

    /// Шаг назад: `Paying -> SeatPicking` (выбор сохраняется), `SeatPicking -> Selecting`
    pub fn back(&mut self) -> Result<(), FlowError> {
        self.state = match &self.state {
            FlowState::Paying(paying) if paying.receipt.is_none() => FlowState::SeatPicking(SeatPicking {
                show_id: paying.show_id.clone(),
                seats: paying.seats.clone(),
                selected: paying.selected.clone(),
            }),
            FlowState::SeatPicking(picking) => FlowState::Selecting(Selection {
                show_id: Some(picking.show_id.clone()),
                ..Selection::default()
            }),
            other => return Err(FlowError::invalid("go back", other)),
        };
        Ok(())
    }

    /// `Paying -> Confirmed`: авторизация платежа, затем подтверждение брони.
    ///
    /// Отказ платёжки оставляет сценарий в `Paying` без брони. Сбой подтверждения
    /// по другой причине тоже оставляет `Paying`, но с сохранённым чеком, и
    /// повторный вызов не списывает деньги второй раз.
    pub async fn pay(&mut self, card: CardDetails) -> Result<Booking, FlowError> {
        let paying = match &mut self.state {
            FlowState::Paying(paying) => paying,
            other => return Err(FlowError::invalid("pay", other)),
        };

        let receipt = match paying.receipt.clone() {
            Some(receipt) => receipt,
            None => {
                let request = PaymentRequest {
                    card_number: card.card_number,
                    expiry_date: card.expiry_date,
                    cvv: card.cvv,
                    amount: paying.amount,
                };
                let receipt = self.backend.authorize_payment(&request).await?;
                paying.receipt = Some(receipt.clone());
                receipt
            }
        };

        let result = self.backend.confirm_booking(&paying.show_id, &paying.selected).await;
        match result {
            Ok(booking) => {
                info!(booking_id = %booking.id, transaction_id = %receipt.transaction_id, "reservation confirmed");
                self.state = FlowState::Confirmed(booking.clone());
                Ok(booking)
            }
            Err(BookingError::SeatConflict { seats: taken }) => {
                let refunded = match self.backend.refund_payment(&receipt).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(transaction_id = %receipt.transaction_id, "refund after seat conflict failed: {}", e);
                        false
                    }
                };

                let mut seats = std::mem::take(&mut paying.seats);
                for seat in seats.iter_mut().filter(|s| taken.contains(&s.id)) {
                    seat.available = false;
                }
                let show_id = std::mem::take(&mut paying.show_id);
                warn!(show_id = %show_id, seats = ?taken, refunded, "seats taken after payment");

                self.state = FlowState::SeatPicking(SeatPicking { show_id, seats, selected: Vec::new() });
                Err(FlowError::SeatTakenAfterPayment { seats: taken, refunded })
            }
            Err(e) => {
                warn!(transaction_id = %receipt.transaction_id, "booking confirmation failed after payment: {}", e);
                Err(e.into())
            }
        }
    }

    /// Чек авторизованного, но ещё не превращённого в бронь платежа
    pub fn pending_receipt(&self) -> Option<&PaymentReceipt> {
        match &self.state {
            FlowState::Paying(paying) => paying.receipt.as_ref(),
            _ => None,
        }
    }

    /// Отменяет оплату (возвращает деньги, если платёж уже авторизован) и сбрасывает сценарий
    pub async fn cancel(&mut self) -> Result<(), FlowError> {
        if let Some(receipt) = self.pending_receipt().cloned() {
            self.backend.refund_payment(&receipt).await?;
        }
        self.reset();
        Ok(())
    }

    /// Назад к `Selecting` из любого состояния, без побочных эффектов
    pub fn reset(&mut self) {
        self.state = FlowState::Selecting(Selection::default());
    }

    /// Пользователь ушёл. Дальше возможен только `reset`
    pub fn abandon(&mut self) {
        self.state = FlowState::Abandoned;
    }
}
