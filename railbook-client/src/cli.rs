use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use railbook_core::identity::Registration;
use futures_util::stream::{self, select_all, BoxStream, StreamExt};
use railbook_order::{format_remaining, TimerPhase, TimerSubscription};
use railbook_shared::{Masked, Order, PassengerDetails};

use crate::state::ClientContext;
use crate::workflow::SearchForm;

/// Railway ticket booking client
#[derive(Parser, Debug)]
#[command(name = "railbook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and remember the session on this device
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account
    Register(RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Show the logged-in profile
    Whoami,

    /// List routes for a trip
    Search(SearchArgs),

    /// Book a seat and create a PENDING order
    Book(BookArgs),

    /// Manage existing orders
    #[command(subcommand)]
    Orders(OrdersCommand),
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
    /// Defaults to the password itself
    #[arg(long)]
    pub confirm_password: Option<String>,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub passport: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Origin city
    #[arg(long)]
    pub from: String,
    /// Destination city
    #[arg(long)]
    pub to: String,
    /// Travel date, YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    /// Swap origin and destination
    #[arg(long)]
    pub reverse: bool,
    /// Print offers as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BookArgs {
    #[command(flatten)]
    pub search: SearchArgs,
    /// Route id from `search`
    #[arg(long)]
    pub route: i64,
    /// Carriage id; with `--seat`, picks that exact seat
    #[arg(long, requires = "seat")]
    pub carriage: Option<i64>,
    /// Seat id; the first available seat is taken when omitted
    #[arg(long, requires = "carriage")]
    pub seat: Option<i64>,
    /// Defaults to the profile
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub document: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum OrdersCommand {
    /// List orders of the logged-in user
    List {
        /// Print orders as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a PENDING order
    Delete { id: i64 },
    /// Follow the payment countdown of PENDING orders until they expire
    Watch {
        /// Only this order
        id: Option<i64>,
    },
}

pub async fn run(cli: Cli, ctx: ClientContext) -> Result<()> {
    ctx.session
        .restore()
        .await
        .context("Failed to read stored session")?;

    match cli.command {
        Command::Login { email, password } => {
            let profile = ctx.auth().login(&email, &password).await.map_err(user_error)?;
            println!("Вы вошли как {} {} ({})", profile.first_name, profile.last_name, profile.email);
        }
        Command::Register(args) => {
            let confirmation = args.confirm_password.clone().unwrap_or_else(|| args.password.clone());
            let registration = Registration {
                email: args.email,
                password: Masked(args.password),
                first_name: args.first_name,
                last_name: args.last_name,
                passport_data: args.passport.map(Masked),
            };
            let profile = ctx
                .auth()
                .register(registration, &confirmation)
                .await
                .map_err(user_error)?;
            println!("Аккаунт создан: {}", profile.email);
        }
        Command::Logout => {
            ctx.auth().logout().await.map_err(user_error)?;
            println!("Сессия завершена");
        }
        Command::Whoami => match ctx.auth().profile() {
            Some(profile) => {
                println!("{} {} <{}> (id {})", profile.first_name, profile.last_name, profile.email, profile.id);
                if let Some(passport) = profile.passport_data {
                    println!("Паспорт: {}", passport);
                }
            }
            None => println!("Вход не выполнен"),
        },
        Command::Search(args) => search(&ctx, &args).await?,
        Command::Book(args) => book(&ctx, args).await?,
        Command::Orders(command) => orders(&ctx, command).await?,
    }
    Ok(())
}

fn search_form(args: &SearchArgs) -> SearchForm {
    let mut form = SearchForm::new(&args.from, &args.to, &args.date);
    if args.reverse {
        form.swap_cities();
    }
    form
}

fn user_error(err: crate::error::BookingError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

async fn search(ctx: &ClientContext, args: &SearchArgs) -> Result<()> {
    let mut workflow = ctx.workflow();
    workflow.submit_search(&search_form(args)).map_err(user_error)?;
    let offers = workflow.load_routes().await.map_err(user_error)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(offers)?);
        return Ok(());
    }
    if offers.is_empty() {
        println!("Маршруты не найдены");
    }
    for offer in offers {
        println!(
            "#{:<5} {:<8} {} → {}  {:>8}  {:>8.2} BYN  мест: {}",
            offer.id,
            offer.train.number,
            offer.departure_time,
            offer.arrival_time,
            offer.duration_label,
            offer.unit_price,
            offer.available_seat_count
        );
    }
    Ok(())
}

async fn book(ctx: &ClientContext, args: BookArgs) -> Result<()> {
    let mut workflow = ctx.workflow();
    workflow.submit_search(&search_form(&args.search)).map_err(user_error)?;
    workflow.load_routes().await.map_err(user_error)?;
    workflow.select_route(args.route).map_err(user_error)?;

    let map = workflow.load_seat_map().await.map_err(user_error)?;
    let (carriage_id, seat_id) = match (args.carriage, args.seat) {
        (Some(carriage), Some(seat)) => (carriage, seat),
        _ => map
            .carriages
            .iter()
            .flat_map(|entry| entry.seats.iter())
            .find(|seat| seat.is_available)
            .map(|seat| (seat.carriage_id, seat.id))
            .context("Свободных мест нет")?,
    };
    let seat = workflow.select_seat(carriage_id, seat_id).map_err(user_error)?;
    println!("Место {} в вагоне {}", seat.seat_number, seat.carriage_number);

    let prefill = workflow.passenger_prefill();
    let passenger = PassengerDetails::new(
        args.first_name.unwrap_or(prefill.first_name),
        args.last_name.unwrap_or(prefill.last_name),
        args.document.unwrap_or(prefill.travel_document_id.into_inner()),
    );
    let booking = workflow.submit_passenger(passenger).await.map_err(user_error)?;

    print_order(&booking.order, booking.timer.as_ref().map(|t| t.phase()));
    println!("Оплатите заказ в течение 15 минут");
    Ok(())
}

async fn orders(ctx: &ClientContext, command: OrdersCommand) -> Result<()> {
    if !ctx.session.is_authenticated() {
        bail!("Необходимо войти в систему");
    }
    ctx.orders.refresh().await;

    match command {
        OrdersCommand::List { json } => {
            let orders = ctx.orders.orders().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&orders)?);
                return Ok(());
            }
            if orders.is_empty() {
                println!("Заказов нет");
            }
            for order in &orders {
                let phase = order.status.is_pending().then(|| ctx.orders.timer().phase(order.created_at));
                print_order(order, phase);
            }
        }
        OrdersCommand::Delete { id } => {
            if ctx.orders.delete(id).await {
                println!("Заказ #{} удалён", id);
            } else {
                bail!("Не удалось удалить заказ #{}", id);
            }
        }
        OrdersCommand::Watch { id } => watch(ctx, id).await?,
    }
    Ok(())
}

async fn watch(ctx: &ClientContext, only: Option<i64>) -> Result<()> {
    let mut subscriptions = Vec::new();
    for order in ctx.orders.orders().await {
        if only.is_some_and(|id| id != order.id) {
            continue;
        }
        if let Some(subscription) = ctx.orders.watch_order(&order) {
            subscriptions.push((order.id, subscription));
        }
    }
    if subscriptions.is_empty() {
        println!("Нет заказов, ожидающих оплаты");
        return Ok(());
    }

    let mut updates = select_all(
        subscriptions
            .into_iter()
            .map(|(order_id, subscription)| phase_updates(order_id, subscription)),
    );
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some((order_id, phase)) => print_phase(order_id, phase),
                None => break,
            },
            _ = &mut ctrl_c => return Ok(()),
        }
    }

    // expiry refreshes run in the background; make sure the final state is loaded
    ctx.orders.refresh().await;
    for order in ctx.orders.orders().await {
        if only.map_or(true, |id| id == order.id) {
            print_order(&order, None);
        }
    }
    Ok(())
}

/// Current phase of one countdown followed by every update, ending after expiry.
fn phase_updates(order_id: i64, subscription: TimerSubscription) -> BoxStream<'static, (i64, TimerPhase)> {
    let initial = subscription.phase();
    let first = stream::iter([(order_id, initial)]);
    let rest = stream::unfold(
        (!initial.is_expired()).then_some(subscription),
        move |state| async move {
            let mut subscription = state?;
            let phase = subscription.changed().await?;
            let next = (!phase.is_expired()).then_some(subscription);
            Some(((order_id, phase), next))
        },
    );
    first.chain(rest).boxed()
}

fn print_phase(order_id: i64, phase: TimerPhase) {
    match phase {
        TimerPhase::Expired => println!("#{}: время на оплату истекло", order_id),
        TimerPhase::Urgent { remaining } => println!("#{}: осталось {} (!)", order_id, format_remaining(remaining)),
        TimerPhase::Counting { remaining } => println!("#{}: осталось {}", order_id, format_remaining(remaining)),
    }
}

fn print_order(order: &Order, phase: Option<TimerPhase>) {
    let countdown = match phase {
        Some(TimerPhase::Expired) => " (истекло)".to_string(),
        Some(phase) => format!(" ({})", format_remaining(phase.remaining())),
        None => String::new(),
    };
    println!(
        "Заказ #{} [{}{}] {} {} {} → {}, вагон {} место {}, {:.2} BYN, {}",
        order.id,
        order.status,
        countdown,
        order.route.train.number,
        order.route.schedule_name,
        order.route.departure_time,
        order.route.arrival_time,
        order.seat.carriage_number,
        order.seat.seat_number,
        order.total_amount,
        order.passenger.full_name()
    );
}
