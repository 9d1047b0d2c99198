//! Conservative stack-cost bounds for functions whose code was never
//! compiled locally: libc, libm, the vendor HAL and the RTOS API.
//!
//! Without these bounds any call into un-instrumented library code would
//! appear to cost zero bytes of stack, silently underestimating the
//! worst case. The values are upper bounds for typical ARM builds, never
//! exact measurements.

/// Fallback for functions matching nothing in the table.
pub const UNKNOWN_CALL_BYTES: u32 = 128;

#[rustfmt::skip]
const TABLE: &[(&str, u32)] = &[
    // formatted I/O
    ("printf", 512),
    ("sprintf", 256),
    ("snprintf", 256),
    ("fprintf", 512),
    ("vprintf", 512),
    ("vsprintf", 256),
    ("vsnprintf", 256),
    // string and memory ops
    ("strcpy", 32),
    ("strncpy", 32),
    ("strcat", 32),
    ("strncat", 32),
    ("strcmp", 32),
    ("strncmp", 32),
    ("strlen", 16),
    ("memcpy", 32),
    ("memmove", 32),
    ("memset", 32),
    ("memcmp", 32),
    // libm
    ("sqrt", 64),
    ("sqrtf", 64),
    ("sin", 128),
    ("sinf", 128),
    ("cos", 128),
    ("cosf", 128),
    ("atan2", 128),
    ("atan2f", 128),
    ("pow", 128),
    ("powf", 128),
    ("exp", 128),
    ("expf", 128),
    ("log", 128),
    ("logf", 128),
    // allocator
    ("malloc", 64),
    ("free", 64),
    ("calloc", 64),
    ("realloc", 128),
    // STM32 HAL
    ("HAL_UART_Transmit", 64),
    ("HAL_UART_Receive", 64),
    ("HAL_I2C_Master_Transmit", 96),
    ("HAL_I2C_Master_Receive", 96),
    ("HAL_SPI_Transmit", 64),
    ("HAL_SPI_Receive", 64),
    ("HAL_CAN_AddTxMessage", 64),
    ("HAL_GPIO_WritePin", 16),
    ("HAL_GPIO_ReadPin", 16),
    ("HAL_Delay", 32),
    // CMSIS-RTOS / FreeRTOS API
    ("osDelay", 32),
    ("osThreadNew", 64),
    ("osMessageQueuePut", 64),
    ("osMessageQueueGet", 64),
    ("osMutexAcquire", 48),
    ("osMutexRelease", 48),
    ("osEventFlagsSet", 48),
    ("osEventFlagsWait", 48),
];

/// Look up a conservative bound for `name`: exact match first, then
/// prefix match. The prefix rule catches compiler-suffixed variants of
/// library entry points (e.g. a cloned `memcpy` helper) that name
/// canonicalization did not cover.
pub fn estimate_for(name: &str) -> Option<u32> {
    if let Some((_, bytes)) = TABLE.iter().find(|(key, _)| *key == name) {
        return Some(*bytes);
    }

    TABLE
        .iter()
        .find(|(key, _)| name.starts_with(key))
        .map(|(_, bytes)| *bytes)
}
