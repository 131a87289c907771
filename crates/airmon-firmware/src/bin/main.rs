#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use airmon_core::app_state::{AppState, Readiness};
use airmon_core::cloud::SmartThingsClient;
use airmon_core::config::Cadence;
use airmon_core::fan::FanState;
use airmon_core::led::{BufferedStrip, Indicators};
use airmon_core::network::NetworkLink;
use airmon_core::tasks::{
    StatusContext, heartbeat_task, network_task, presentation_task, sampling_task, status_task,
};
use airmon_firmware::hardware::{
    BoardIndicators, BoardSensors, FanPin, STRIP_BUFFER_SIZE, SensorBus, StatusPin, Ws2812Sink,
    create_i2c_bus, create_pm1006_uart, init_sensors,
};
use airmon_firmware::http::{
    HttpsTransport, RESPONSE_BUFFER_SIZE, TCP_BUFFER_SIZE, TCP_CONNECTIONS, TLS_BUFFER_SIZE, Tcp,
};
use airmon_firmware::secrets::CONFIG;
use airmon_firmware::wifi::WifiLink;
use embassy_executor::Spawner;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::TcpClientState;
use embassy_net::{Runner, StackResources};
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::interrupt::Priority;
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rmt::Rmt;
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_smartled::Ws2812SmartLeds;
use esp_radio::wifi::WifiDevice;
use esp_rtos::embassy::InterruptExecutor;
use log::{error, info};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use static_cell::StaticCell;

/// Strip brightness until the first status fetch sets it.
const INITIAL_BRIGHTNESS: u8 = 5;

/// Status reconciliation and the network stack preempt every other task.
const CLOUD_PRIORITY: Priority = Priority::Priority3;
/// Sampling preempts the thread-mode tasks, the link monitor among them.
const SAMPLING_PRIORITY: Priority = Priority::Priority2;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    esp_hal::system::software_reset()
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Log the unrecoverable condition and restart the chip.
fn restart(task: &str, error: &dyn core::fmt::Display) -> ! {
    error!("{} failed: {}; restarting", task, error);
    esp_hal::system::software_reset()
}

fn random_seed(rng: &Rng) -> u64 {
    (u64::from(rng.random()) << 32) | u64::from(rng.random())
}

#[embassy_executor::task]
async fn run_heartbeat(state: &'static AppState, mut led: StatusPin) {
    match heartbeat_task(state, &mut led).await {}
}

#[embassy_executor::task]
async fn run_presentation(state: &'static AppState, indicators: &'static BoardIndicators) {
    if let Err(e) = presentation_task(state, indicators).await {
        restart("presentation", &e);
    }
}

#[embassy_executor::task]
async fn run_sampling(
    state: &'static AppState,
    mut sensors: BoardSensors,
    indicators: &'static BoardIndicators,
    sensors_started: Instant,
) {
    let Err(e) = sampling_task(state, &mut sensors, indicators, sensors_started).await;
    restart("sampling", &e);
}

#[embassy_executor::task]
async fn run_status(
    state: &'static AppState,
    mut cloud: SmartThingsClient<HttpsTransport<'static>>,
    mut fan: FanPin,
    indicators: &'static BoardIndicators,
) {
    let Err(e) = status_task(StatusContext {
        state,
        cloud: &mut cloud,
        fan: &mut fan,
        indicators,
    })
    .await;
    restart("status", &e);
}

#[embassy_executor::task]
async fn run_network(state: &'static AppState, mut link: WifiLink<'static>) {
    match network_task(state, &mut link).await {}
}

#[embassy_executor::task]
async fn run_net_stack(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Bring up the network stack and the status task on the cloud executor.
///
/// The stack is bound to the executor it is created on, so everything that
/// touches it is spawned from here.
#[embassy_executor::task]
async fn run_cloud(
    state: &'static AppState,
    fan: FanPin,
    indicators: &'static BoardIndicators,
    device: WifiDevice<'static>,
    net_seed: u64,
    tls_seed: u64,
) {
    let spawner = Spawner::for_current_executor().await;

    static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        device,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        net_seed,
    );
    spawner.must_spawn(run_net_stack(runner));

    static TCP_STATE: StaticCell<TcpClientState<TCP_CONNECTIONS, TCP_BUFFER_SIZE, TCP_BUFFER_SIZE>> =
        StaticCell::new();
    static TCP: StaticCell<Tcp<'static>> = StaticCell::new();
    static DNS: StaticCell<DnsSocket<'static>> = StaticCell::new();
    static TLS_READ: StaticCell<[u8; TLS_BUFFER_SIZE]> = StaticCell::new();
    static TLS_WRITE: StaticCell<[u8; TLS_BUFFER_SIZE]> = StaticCell::new();
    static RESPONSE: StaticCell<[u8; RESPONSE_BUFFER_SIZE]> = StaticCell::new();

    let tcp = TCP.init(Tcp::new(stack, TCP_STATE.init(TcpClientState::new())));
    let dns = DNS.init(DnsSocket::new(stack));
    let tls = TlsConfig::new(
        tls_seed,
        TLS_READ.init([0; TLS_BUFFER_SIZE]),
        TLS_WRITE.init([0; TLS_BUFFER_SIZE]),
        TlsVerify::None,
    );
    let transport = HttpsTransport::new(
        HttpClient::new_with_tls(tcp, dns, tls),
        RESPONSE.init([0; RESPONSE_BUFFER_SIZE]),
    );
    let cloud = SmartThingsClient::new(
        transport,
        CONFIG.cloud.device_id,
        CONFIG.cloud.access_token,
    );
    spawner.must_spawn(run_status(state, cloud, fan, indicators));
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);

    info!("Embassy initialized!");

    // The fan runs from power-on
    let fan = FanPin(Output::new(
        peripherals.GPIO10,
        Level::High,
        OutputConfig::default(),
    ));
    static STATE: StaticCell<AppState> = StaticCell::new();
    let state: &'static AppState =
        STATE.init(AppState::new(Cadence::DEFAULT, FanState::started(Instant::now())));

    // Status LED and indicator strip
    let status_led = StatusPin(Output::new(
        peripherals.GPIO2,
        Level::Low,
        OutputConfig::default(),
    ));

    let rmt = match Rmt::new(peripherals.RMT, Rate::from_mhz(80)) {
        Ok(rmt) => rmt,
        Err(e) => restart("RMT init", &alloc::format!("{:?}", e)),
    };
    let driver = match Ws2812SmartLeds::<STRIP_BUFFER_SIZE, _>::new(rmt.channel0, peripherals.GPIO38)
    {
        Ok(driver) => driver,
        Err(e) => restart("WS2812 init", &alloc::format!("{:?}", e)),
    };
    static INDICATORS: StaticCell<BoardIndicators> = StaticCell::new();
    let indicators: &'static BoardIndicators = INDICATORS.init(Indicators::new(
        BufferedStrip::new(Ws2812Sink::new(driver), INITIAL_BRIGHTNESS),
        state.cadence.lock_max_wait,
    ));

    spawner.must_spawn(run_heartbeat(state, status_led));
    spawner.must_spawn(run_presentation(state, indicators));

    // Sensors
    static SENSOR_BUS: StaticCell<SensorBus> = StaticCell::new();
    let i2c = create_i2c_bus(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9);
    let uart = create_pm1006_uart(peripherals.UART1, peripherals.GPIO17, peripherals.GPIO18);
    let sensors = match (i2c, uart) {
        (Ok(i2c), Ok(uart)) => init_sensors(SENSOR_BUS.init(AsyncMutex::new(i2c)), uart).await,
        (Err(e), _) | (_, Err(e)) => Err(e),
    };

    let sensors = match sensors {
        Ok(sensors) => sensors,
        Err(e) => {
            error!("Sensor initialization failed: {}", e);
            state.readiness.mark(Readiness::SensorInitFailed);
            loop {
                Timer::after(Duration::from_secs(3600)).await;
            }
        }
    };
    let sensors_started = Instant::now();

    static SAMPLING_EXECUTOR: StaticCell<InterruptExecutor<1>> = StaticCell::new();
    let sampling_spawner = SAMPLING_EXECUTOR
        .init(InterruptExecutor::new(sw_ints.software_interrupt1))
        .start(SAMPLING_PRIORITY);
    sampling_spawner.must_spawn(run_sampling(state, sensors, indicators, sensors_started));

    // Network
    let rng = Rng::new();

    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => restart("radio init", &alloc::format!("{:?}", e)),
    };
    let (controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()) {
            Ok(parts) => parts,
            Err(e) => restart("Wi-Fi init", &alloc::format!("{:?}", e)),
        };

    let mut link = match WifiLink::new(controller, &CONFIG.internet) {
        Ok(link) => link,
        Err(e) => restart("Wi-Fi config", &e),
    };
    info!("Connecting to {}", CONFIG.internet.ssid);
    if let Err(e) = link.reconnect().await {
        error!("Initial Wi-Fi connection failed: {}", e);
    }
    spawner.must_spawn(run_network(state, link));

    // Cloud
    static CLOUD_EXECUTOR: StaticCell<InterruptExecutor<2>> = StaticCell::new();
    let cloud_spawner = CLOUD_EXECUTOR
        .init(InterruptExecutor::new(sw_ints.software_interrupt2))
        .start(CLOUD_PRIORITY);
    cloud_spawner.must_spawn(run_cloud(
        state,
        fan,
        indicators,
        interfaces.sta,
        random_seed(&rng),
        random_seed(&rng),
    ));

    info!("All tasks spawned");
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
